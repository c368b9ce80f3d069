// src/checker/fixes.rs
// =============================================================================
// Fix suggestions for console errors.
//
// The rules below form an ordered table. For a given console message the
// rules are tried top to bottom and the FIRST one whose predicate matches
// supplies the suggestion. Later rules never see a message that an earlier
// rule already claimed, so moving a rule changes results: keep the more
// specific rules above the generic ones.
//
// Each rule is a pair of plain functions:
//   matches(message) -> bool
//   suggest(message) -> FixSuggestion
// =============================================================================

use regex::Regex;
use std::sync::LazyLock;

use crate::model::{FixOperation, FixSuggestion};

// The message in both spellings, so predicates don't lower-case repeatedly
pub struct RuleInput<'a> {
    pub raw: &'a str,
    pub lower: String,
}

impl<'a> RuleInput<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: raw.to_lowercase(),
        }
    }

    fn has(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    fn has_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|n| self.lower.contains(n))
    }
}

pub struct FixRule {
    pub name: &'static str,
    matches: fn(&RuleInput) -> bool,
    suggest: fn(&RuleInput) -> FixSuggestion,
}

impl FixRule {
    pub fn matches(&self, input: &RuleInput) -> bool {
        (self.matches)(input)
    }

    pub fn suggest(&self, input: &RuleInput) -> FixSuggestion {
        (self.suggest)(input)
    }
}

// Evaluation order matters, see the module header
pub static FIX_RULES: &[FixRule] = &[
    FixRule {
        name: "i18n-locale-routing",
        matches: |m| m.raw.contains("next-intl") && m.has("locale"),
        suggest: |_| {
            FixSuggestion::new(
                "Run the next-intl middleware on this route so a locale can be resolved",
                0.85,
                vec![FixOperation::edit(
                    "middleware.ts",
                    "matcher: ['/((?!api|_next).*)']",
                    "matcher: ['/', '/(de|en)/:path*', '/((?!api|_next|_vercel|.*\\\\..*).*)']",
                    "Extend the middleware matcher to cover localized routes",
                )],
            )
        },
    },
    FixRule {
        name: "missing-module",
        matches: |m| m.has("cannot find module"),
        suggest: |m| missing_module_suggestion(m.raw),
    },
    FixRule {
        name: "timeout",
        matches: |m| m.raw.contains("ETIMEDOUT") || m.has("timeout") || m.has("timed out"),
        suggest: |_| {
            FixSuggestion::new(
                "Increase the request timeout or check that the upstream service is reachable",
                0.6,
                vec![],
            )
        },
    },
    FixRule {
        name: "hydration-mismatch",
        matches: |m| {
            m.has("hydration") && m.has_any(&["mismatch", "failed", "did not match"])
        },
        suggest: |_| {
            FixSuggestion::new(
                "Make server and client render the same markup (move browser-only values into useEffect)",
                0.75,
                vec![FixOperation::edit(
                    "",
                    "const now = Date.now();",
                    "const [now, setNow] = useState<number | null>(null);\nuseEffect(() => setNow(Date.now()), []);",
                    "Defer client-only values until after hydration",
                )],
            )
        },
    },
    FixRule {
        name: "cors",
        matches: |m| m.has("cors") || m.has("access-control-allow-origin"),
        suggest: |_| {
            FixSuggestion::new(
                "Allow this origin in the API's CORS configuration",
                0.8,
                vec![FixOperation::edit(
                    "",
                    "app.use(cors())",
                    "app.use(cors({ origin: process.env.ALLOWED_ORIGIN, credentials: true }))",
                    "Configure an explicit allowed origin",
                )],
            )
        },
    },
    FixRule {
        name: "out-of-memory",
        matches: |m| m.has_any(&["out of memory", "javascript heap", "heap limit"]),
        suggest: |_| {
            FixSuggestion::new(
                "Raise the Node.js heap limit and look for unbounded allocations",
                0.7,
                vec![FixOperation::bash(
                    "export NODE_OPTIONS=--max-old-space-size=4096",
                    "Give the process a 4GB heap",
                )],
            )
        },
    },
    FixRule {
        name: "null-access",
        matches: |m| {
            m.has_any(&["cannot read propert", "cannot read properties"])
                && m.has_any(&["null", "undefined"])
                || m.has("is not an object") && m.has("undefined")
        },
        suggest: |_| {
            FixSuggestion::new(
                "Guard the property access with optional chaining",
                0.85,
                vec![FixOperation::edit(
                    "",
                    "obj.prop.value",
                    "obj?.prop?.value",
                    "Use optional chaining on the nullable value",
                )],
            )
        },
    },
    FixRule {
        name: "invalid-hook-call",
        matches: |m| {
            m.has_any(&[
                "invalid hook call",
                "rendered more hooks",
                "rendered fewer hooks",
                "change in the order of hooks",
            ])
        },
        suggest: |_| {
            FixSuggestion::new(
                "Call hooks unconditionally at the top level of the component",
                0.8,
                vec![],
            )
        },
    },
    FixRule {
        name: "indentation-lint",
        matches: |m| m.has("indentation"),
        suggest: |_| {
            FixSuggestion::new(
                "Reformat the file with the project's linter",
                0.95,
                vec![FixOperation::bash("npx eslint --fix .", "Apply lint auto-fixes")],
            )
        },
    },
    FixRule {
        name: "type-assignability",
        matches: |m| m.has("is not assignable to type"),
        suggest: |_| {
            FixSuggestion::new(
                "Align the value with the declared type or widen the type annotation",
                0.6,
                vec![FixOperation::bash("npx tsc --noEmit", "Re-run the type checker")],
            )
        },
    },
    FixRule {
        name: "unique-constraint",
        matches: |m| m.has("unique constraint") || m.has("duplicate key"),
        suggest: |_| {
            FixSuggestion::new(
                "Check for an existing row before inserting, or use an upsert",
                0.7,
                vec![FixOperation::edit(
                    "",
                    "INSERT INTO",
                    "INSERT INTO ... ON CONFLICT DO NOTHING",
                    "Make the insert idempotent",
                )],
            )
        },
    },
    FixRule {
        name: "n-plus-one-query",
        matches: |m| m.has("n+1") || m.has("n + 1 quer"),
        suggest: |_| {
            FixSuggestion::new(
                "Batch the related lookups into one query (eager loading or a join)",
                0.65,
                vec![],
            )
        },
    },
    FixRule {
        name: "missing-env-var",
        matches: |m| {
            m.has("environment variable") && m.has_any(&["missing", "not set", "undefined", "required"])
                || m.has("process.env") && m.has("undefined")
        },
        suggest: |m| missing_env_suggestion(m.raw),
    },
    FixRule {
        name: "connection-refused",
        matches: |m| m.raw.contains("ECONNREFUSED") || m.has("connection refused"),
        suggest: |_| {
            FixSuggestion::new(
                "Start the backing service or fix the host/port the client connects to",
                0.7,
                vec![],
            )
        },
    },
    FixRule {
        name: "invalid-token",
        matches: |m| m.has("jwt") || (m.has("token") && m.has_any(&["invalid", "expired"])),
        suggest: |_| {
            FixSuggestion::new(
                "Refresh the authentication token and retry the request",
                0.75,
                vec![],
            )
        },
    },
    FixRule {
        name: "rate-limited",
        matches: |m| m.raw.contains("429") || m.has("too many requests") || m.has("rate limit"),
        suggest: |_| {
            FixSuggestion::new(
                "Back off and retry with exponential delay, or cache the response",
                0.7,
                vec![],
            )
        },
    },
    FixRule {
        name: "stale-cache",
        matches: |m| m.has("stale") && m.has("cache"),
        suggest: |_| {
            FixSuggestion::new(
                "Clear the build cache and rebuild",
                0.75,
                vec![FixOperation::delete(".next/cache", "Remove the stale build cache")],
            )
        },
    },
    FixRule {
        name: "missing-image",
        matches: |m| {
            m.raw.contains("404")
                && m.has_any(&[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", "image"])
        },
        suggest: |_| {
            FixSuggestion::new(
                "Add the missing image under public/ or fix the image path",
                0.85,
                vec![],
            )
        },
    },
    FixRule {
        name: "oversized-bundle",
        matches: |m| {
            m.has("bundle size") || m.has("asset size limit") || m.has("chunk") && m.has("exceed")
        },
        suggest: |_| {
            FixSuggestion::new(
                "Split the bundle with dynamic imports",
                0.6,
                vec![FixOperation::edit(
                    "",
                    "import Heavy from './Heavy';",
                    "const Heavy = dynamic(() => import('./Heavy'));",
                    "Load the heavy component lazily",
                )],
            )
        },
    },
    FixRule {
        name: "missing-list-key",
        matches: |m| m.has("unique \"key\" prop") || m.has("unique key prop"),
        suggest: |_| {
            FixSuggestion::new(
                "Give each list item a stable key prop",
                0.9,
                vec![FixOperation::edit(
                    "",
                    "items.map((item) => <Item {...item} />)",
                    "items.map((item) => <Item key={item.id} {...item} />)",
                    "Key list children by id",
                )],
            )
        },
    },
    FixRule {
        name: "deprecated-api",
        matches: |m| m.has("deprecated"),
        suggest: |_| {
            FixSuggestion::new(
                "Replace the deprecated API with its documented successor",
                0.5,
                vec![],
            )
        },
    },
    FixRule {
        name: "stack-overflow",
        matches: |m| {
            m.has_any(&["maximum call stack", "too much recursion", "stack overflow"])
        },
        suggest: |_| {
            FixSuggestion::new(
                "Add a base case to the recursive call or break the update loop",
                0.6,
                vec![],
            )
        },
    },
];

// Returns the suggestion of the first matching rule, if any
pub fn suggest_fix(message: &str) -> Option<FixSuggestion> {
    matching_rule(message).map(|rule| rule.suggest(&RuleInput::new(message)))
}

pub fn matching_rule(message: &str) -> Option<&'static FixRule> {
    let input = RuleInput::new(message);
    FIX_RULES.iter().find(|rule| rule.matches(&input))
}

static MODULE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)cannot find module\s+['"`]([^'"`]+)['"`]"#).expect("valid regex")
});

static ENV_VAR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][A-Z0-9]*(?:_[A-Z0-9]+)+)\b").expect("valid regex"));

fn missing_module_suggestion(message: &str) -> FixSuggestion {
    let Some(module) = MODULE_NAME
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        return FixSuggestion::new(
            "Reinstall project dependencies",
            0.7,
            vec![FixOperation::bash("npm install", "Install dependencies")],
        );
    };

    // Relative imports are a wrong path, not a missing package
    if module.starts_with('.') || module.starts_with('/') {
        return FixSuggestion::new(format!("Fix the import path: {module}"), 0.5, vec![]);
    }

    let package = package_name(module);
    FixSuggestion::new(
        format!("Install missing dependency: {package}"),
        0.9,
        vec![FixOperation::bash(
            format!("npm install {package}"),
            format!("Add {package} to dependencies"),
        )],
    )
}

// "lodash/fp" -> "lodash", "@scope/pkg/sub" -> "@scope/pkg"
fn package_name(module: &str) -> String {
    let parts: Vec<&str> = module.split('/').collect();
    if module.starts_with('@') && parts.len() >= 2 {
        format!("{}/{}", parts[0], parts[1])
    } else {
        parts[0].to_string()
    }
}

fn missing_env_suggestion(message: &str) -> FixSuggestion {
    let name = ENV_VAR_NAME
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    match name {
        Some(name) => FixSuggestion::new(
            format!("Define the {name} environment variable"),
            0.85,
            vec![FixOperation::create(
                ".env.local",
                format!("{name}="),
                format!("Add {name} to the local environment file"),
            )],
        ),
        None => FixSuggestion::new(
            "Define the missing environment variable in .env.local",
            0.6,
            vec![],
        ),
    }
}
