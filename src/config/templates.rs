//! Built-in language table.

use once_cell::sync::Lazy;

use super::language::{Comment, Language};

/// Built-in languages, lazily initialized.
static BUILTIN_LANGUAGES: Lazy<Vec<Language>> = Lazy::new(|| {
    let slash = || Comment::line("//");
    let hash = || Comment::line("#");
    let dash = || Comment::line("--");
    vec![
        Language::new("c", slash()).with_identifiers(&["h"]),
        Language::new("cpp", slash()).with_identifiers(&["c++", "cxx", "cc", "hpp"]),
        Language::new("java", slash()),
        Language::new("javascript", slash()).with_identifiers(&["js", "mjs"]),
        Language::new("typescript", slash()).with_identifiers(&["ts"]),
        Language::new("rust", slash()).with_identifiers(&["rs"]),
        Language::new("go", slash()),
        Language::new("swift", slash()),
        Language::new("kotlin", slash()).with_identifiers(&["kt"]),
        Language::new("csharp", slash()).with_identifiers(&["cs", "c#"]),
        Language::new("zig", slash()),
        Language::new("python", hash()).with_identifiers(&["py", "python3"]),
        Language::new("ruby", hash()).with_identifiers(&["rb"]),
        Language::new("perl", hash()).with_identifiers(&["pl"]),
        Language::new("bash", hash()).with_identifiers(&["sh", "shell", "zsh"]),
        Language::new("r", hash()),
        Language::new("julia", hash()).with_identifiers(&["jl"]),
        Language::new("yaml", hash()).with_identifiers(&["yml"]),
        Language::new("toml", hash()),
        Language::new("make", hash()).with_identifiers(&["makefile", "mk"]),
        Language::new("nim", hash()),
        Language::new("elisp", Comment::line(";")).with_identifiers(&["el", "lisp"]),
        Language::new("clojure", Comment::line(";")).with_identifiers(&["clj"]),
        Language::new("haskell", dash()).with_identifiers(&["hs"]),
        Language::new("lua", dash()),
        Language::new("sql", dash()),
        Language::new("ocaml", Comment::block("(*", "*)")).with_identifiers(&["ml"]),
        Language::new("html", Comment::block("<!--", "-->")).with_identifiers(&["htm"]),
        Language::new("xml", Comment::block("<!--", "-->")),
        Language::new("css", Comment::block("/*", "*/")),
        Language::new("tex", Comment::line("%")).with_identifiers(&["latex"]),
        Language::new("fortran", Comment::line("!")).with_identifiers(&["f90"]),
    ]
});

/// Returns the list of built-in language configurations.
pub fn builtin_languages() -> &'static [Language] {
    &BUILTIN_LANGUAGES
}

/// Find a built-in language by name, fence tag or extension.
pub fn find_language(identifier: &str) -> Option<&'static Language> {
    builtin_languages()
        .iter()
        .find(|lang| lang.matches(identifier))
}
