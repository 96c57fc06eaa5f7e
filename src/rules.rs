//! Per-language tables of token categories and their typing behaviour.
//!
//! A category groups tokens that a person types the same way: keywords come
//! out of muscle memory, boilerplate even faster, operators get a short
//! hesitation on either side. Language tables are looked up by key
//! (case-insensitive); operator and punctuation categories apply to every
//! language, including unknown ones.

use crate::error::RuleError;
use tracing::warn;

/// A static category definition as it appears in the tables below.
#[derive(Debug, Clone, Copy)]
pub struct CategorySpec {
    pub name: &'static str,
    pub tokens: &'static [&'static str],
    pub speed_multiplier: f64,
    pub pause_before: f64,
    pub pause_after: f64,
}

/// One validated token with its timing policy.
///
/// Immutable once built. Pauses are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternRule {
    category: String,
    token: String,
    speed_multiplier: f64,
    pause_before: f64,
    pause_after: f64,
}

impl PatternRule {
    /// Build a rule, rejecting an empty token, a multiplier that is not
    /// strictly positive, or a negative/non-finite pause.
    pub fn new(
        category: impl Into<String>,
        token: impl Into<String>,
        speed_multiplier: f64,
        pause_before: f64,
        pause_after: f64,
    ) -> Result<Self, RuleError> {
        let category = category.into();
        let token = token.into();

        if token.is_empty() {
            return Err(RuleError::EmptyToken(category));
        }
        if !(speed_multiplier.is_finite() && speed_multiplier > 0.0) {
            return Err(RuleError::NonPositiveMultiplier {
                token,
                value: speed_multiplier,
            });
        }
        for (which, value) in [("before", pause_before), ("after", pause_after)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RuleError::InvalidPause {
                    token,
                    which,
                    value,
                });
            }
        }

        Ok(Self {
            category,
            token,
            speed_multiplier,
            pause_before,
            pause_after,
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    pub fn pause_before(&self) -> f64 {
        self.pause_before
    }

    pub fn pause_after(&self) -> f64 {
        self.pause_after
    }

    /// Token length in characters, the key the matcher orders by.
    pub fn char_len(&self) -> usize {
        self.token.chars().count()
    }
}

static LANGUAGES: &[(&str, &[CategorySpec])] = &[
    ("java", JAVA),
    ("javascript", JAVASCRIPT),
    ("react", REACT),
    ("css", CSS),
];

/// Keys of every language with its own table.
pub fn known_languages() -> impl Iterator<Item = &'static str> {
    LANGUAGES.iter().map(|(key, _)| *key)
}

/// Language-specific categories for `language`, matched case-insensitively.
///
/// Unknown keys yield an empty slice.
pub fn language_categories(language: &str) -> &'static [CategorySpec] {
    let key = language.trim().to_lowercase();
    LANGUAGES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, categories)| *categories)
        .unwrap_or(&[])
}

/// Every rule that applies to `language`, in table order: language
/// categories first, then operators (`operator_*`), then punctuation
/// (`punctuation_*`).
///
/// Invalid entries are skipped with a warning.
pub fn rules_for(language: &str) -> Vec<PatternRule> {
    let mut rules = Vec::new();
    push_rules(&mut rules, language_categories(language), "");
    push_rules(&mut rules, OPERATOR_CATEGORIES, "operator_");
    push_rules(&mut rules, PUNCTUATION_CATEGORIES, "punctuation_");
    rules
}

fn push_rules(rules: &mut Vec<PatternRule>, categories: &[CategorySpec], prefix: &str) {
    for spec in categories {
        let category = format!("{prefix}{}", spec.name);
        for token in spec.tokens {
            match PatternRule::new(
                category.as_str(),
                *token,
                spec.speed_multiplier,
                spec.pause_before,
                spec.pause_after,
            ) {
                Ok(rule) => rules.push(rule),
                Err(err) => warn!(%err, "skipping invalid pattern rule"),
            }
        }
    }
}

const JAVA: &[CategorySpec] = &[
    CategorySpec {
        name: "keywords",
        tokens: &[
            "public", "private", "protected", "static", "final", "void", "int", "String",
            "boolean", "class", "interface", "extends", "implements", "import", "package", "try",
            "catch", "finally", "throw", "throws", "new", "this", "super", "return", "if", "else",
            "while", "for", "do", "switch", "case", "break", "continue",
        ],
        speed_multiplier: 1.8,
        pause_before: 0.0,
        pause_after: 0.1,
    },
    CategorySpec {
        name: "boilerplate",
        tokens: &[
            "System.out.println",
            "public static void main",
            "String[] args",
            "@Override",
            "@Autowired",
            "@Component",
            "@Service",
            "@Repository",
            "@Entity",
            "@Table",
            "@Column",
            "@Id",
            "@GeneratedValue",
            "ArrayList<>",
            "HashMap<>",
            "List<>",
            "Map<>",
            "Set<>",
        ],
        speed_multiplier: 2.0,
        pause_before: 0.0,
        pause_after: 0.2,
    },
    CategorySpec {
        name: "brackets_pairs",
        tokens: &["{}", "[]", "()", "<>"],
        speed_multiplier: 3.0,
        pause_before: 0.0,
        pause_after: 0.1,
    },
    CategorySpec {
        name: "annotations",
        tokens: &[
            "@Override",
            "@Deprecated",
            "@SuppressWarnings",
            "@Test",
            "@Before",
            "@After",
            "@Autowired",
            "@Component",
            "@Service",
        ],
        speed_multiplier: 1.6,
        pause_before: 0.1,
        pause_after: 0.2,
    },
];

const JAVASCRIPT: &[CategorySpec] = &[
    CategorySpec {
        name: "keywords",
        tokens: &[
            "function", "const", "let", "var", "return", "if", "else", "for", "while", "do",
            "switch", "case", "break", "continue", "try", "catch", "finally", "throw", "new",
            "this", "typeof", "instanceof", "in", "delete", "void", "true", "false", "null",
            "undefined", "export", "import", "from", "default", "as",
        ],
        speed_multiplier: 1.8,
        pause_before: 0.0,
        pause_after: 0.1,
    },
    CategorySpec {
        name: "boilerplate",
        tokens: &[
            "console.log",
            "document.getElementById",
            "addEventListener",
            "querySelector",
            "querySelectorAll",
            "createElement",
            "setAttribute",
            "getAttribute",
            "appendChild",
            "removeChild",
            "JSON.stringify",
            "JSON.parse",
            "Object.keys",
            "Array.from",
        ],
        speed_multiplier: 2.0,
        pause_before: 0.0,
        pause_after: 0.2,
    },
    CategorySpec {
        name: "arrow_functions",
        tokens: &["=>", "() =>", "(param) =>", "async () =>"],
        speed_multiplier: 1.9,
        pause_before: 0.0,
        pause_after: 0.1,
    },
    CategorySpec {
        name: "async_patterns",
        tokens: &["async", "await", "Promise", ".then", ".catch", ".finally"],
        speed_multiplier: 1.4,
        pause_before: 0.1,
        pause_after: 0.1,
    },
];

const REACT: &[CategorySpec] = &[
    CategorySpec {
        name: "hooks",
        tokens: &[
            "useState",
            "useEffect",
            "useContext",
            "useCallback",
            "useMemo",
            "useRef",
            "useReducer",
            "useImperativeHandle",
            "useLayoutEffect",
            "useDebugValue",
            "useId",
            "useDeferredValue",
            "useTransition",
        ],
        speed_multiplier: 1.9,
        pause_before: 0.0,
        pause_after: 0.15,
    },
    CategorySpec {
        name: "jsx_attributes",
        tokens: &[
            "className",
            "onClick",
            "onChange",
            "onSubmit",
            "onFocus",
            "onBlur",
            "onMouseEnter",
            "onMouseLeave",
            "onKeyDown",
            "onKeyUp",
            "value",
            "placeholder",
            "disabled",
            "checked",
            "selected",
            "key",
            "ref",
        ],
        speed_multiplier: 1.7,
        pause_before: 0.0,
        pause_after: 0.1,
    },
    CategorySpec {
        name: "component_patterns",
        tokens: &[
            "import React",
            "export default",
            "React.Component",
            "React.Fragment",
            "PropTypes",
            "defaultProps",
            "render()",
            "componentDidMount",
            "componentDidUpdate",
            "componentWillUnmount",
        ],
        speed_multiplier: 1.8,
        pause_before: 0.0,
        pause_after: 0.15,
    },
    CategorySpec {
        name: "jsx_elements",
        tokens: &[
            "<div>", "<span>", "<p>", "<h1>", "<h2>", "<h3>", "<button>", "<input>", "<form>",
        ],
        speed_multiplier: 2.2,
        pause_before: 0.0,
        pause_after: 0.05,
    },
];

const CSS: &[CategorySpec] = &[
    CategorySpec {
        name: "properties",
        tokens: &[
            "display:",
            "position:",
            "top:",
            "right:",
            "bottom:",
            "left:",
            "width:",
            "height:",
            "margin:",
            "padding:",
            "border:",
            "color:",
            "background:",
            "background-color:",
            "font-size:",
            "font-weight:",
            "font-family:",
            "text-align:",
            "text-decoration:",
            "line-height:",
            "z-index:",
            "opacity:",
            "visibility:",
            "overflow:",
            "float:",
            "clear:",
            "cursor:",
            "box-shadow:",
            "border-radius:",
        ],
        speed_multiplier: 1.6,
        pause_before: 0.0,
        pause_after: 0.1,
    },
    CategorySpec {
        name: "selectors",
        tokens: &[
            ".class",
            "#id",
            ":hover",
            ":focus",
            ":active",
            ":before",
            ":after",
            ":first-child",
            ":last-child",
            ":nth-child",
            "::placeholder",
        ],
        speed_multiplier: 1.4,
        pause_before: 0.05,
        pause_after: 0.1,
    },
    CategorySpec {
        name: "values",
        tokens: &[
            "flex",
            "block",
            "inline",
            "inline-block",
            "grid",
            "none",
            "auto",
            "center",
            "left",
            "right",
            "absolute",
            "relative",
            "fixed",
            "sticky",
            "bold",
            "normal",
            "italic",
            "underline",
            "transparent",
            "inherit",
        ],
        speed_multiplier: 1.5,
        pause_before: 0.0,
        pause_after: 0.05,
    },
    CategorySpec {
        name: "media_queries",
        tokens: &["@media", "@keyframes", "@import", "@font-face"],
        speed_multiplier: 1.3,
        pause_before: 0.2,
        pause_after: 0.3,
    },
];

/// Operators, shared by every language.
pub const OPERATOR_CATEGORIES: &[CategorySpec] = &[
    CategorySpec {
        name: "assignment",
        tokens: &["=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>"],
        speed_multiplier: 1.2,
        pause_before: 0.05,
        pause_after: 0.05,
    },
    CategorySpec {
        name: "comparison",
        tokens: &["==", "===", "!=", "!==", "<", ">", "<=", ">="],
        speed_multiplier: 1.1,
        pause_before: 0.05,
        pause_after: 0.05,
    },
    CategorySpec {
        name: "logical",
        tokens: &["&&", "||", "!", "&", "|", "^"],
        speed_multiplier: 1.0,
        pause_before: 0.1,
        pause_after: 0.1,
    },
    CategorySpec {
        name: "arithmetic",
        tokens: &["+", "-", "*", "/", "%", "++", "--"],
        speed_multiplier: 1.3,
        pause_before: 0.02,
        pause_after: 0.02,
    },
];

/// Punctuation, shared by every language.
pub const PUNCTUATION_CATEGORIES: &[CategorySpec] = &[
    CategorySpec {
        name: "statement_end",
        tokens: &[";"],
        speed_multiplier: 1.5,
        pause_before: 0.0,
        pause_after: 0.2,
    },
    CategorySpec {
        name: "block_structure",
        tokens: &["{", "}"],
        speed_multiplier: 1.4,
        pause_before: 0.1,
        pause_after: 0.2,
    },
    CategorySpec {
        name: "function_params",
        tokens: &["(", ")"],
        speed_multiplier: 1.8,
        pause_before: 0.0,
        pause_after: 0.05,
    },
    CategorySpec {
        name: "array_brackets",
        tokens: &["[", "]"],
        speed_multiplier: 1.6,
        pause_before: 0.0,
        pause_after: 0.05,
    },
];
