//! Messages of the symbol extraction pass and of the two-round symbol
//! reference exchange.

use symbol_index::{SYMBOL_JSON_FORMAT, Symbol};

/// Round one: ask which symbols the file uses without defining them.
pub const SYMBOL_NAMES_REQUEST: &str = r#"
1) list all referred non-standard symbols and all symbols which is missing and not defined or initialized in current file, includes: type, class, traits, enum, const, constant, literal, variable, interface, property, field, attributes, method, function;
2) return a json array of simple name of symbols, e.g. ["symbol1", "symbol2"];
3) output full-qualified symbol name excluding package name or module name
4) exclude any other words excepts the json array
5) if no symbol to check, return an empty array []
"#;

/// Round two: definitions found in other files, one line per symbol.
pub fn symbol_references_message(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(|s| {
            format!(
                "The symbol {} is defined and initialized in other files, {}. Must use this definition while checking and do not report anything related to it as an issue. See: {}",
                s.name, s.path, s.lines
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `a.b.C` and `a::b::C` both become `C`.
pub fn strip_package_prefix(name: &str) -> &str {
    let name = name.trim();
    let after_path = name.rsplit("::").next().unwrap_or(name);
    after_path.rsplit('.').next().unwrap_or(after_path)
}

pub fn symbol_extraction_system(path: &str, code: &str) -> String {
    format!("Working on below code\npath: {}\n{}", path, code)
}

pub fn symbol_extraction_request() -> String {
    format!(
        "extract any either visible or exposable symbols 1) includes: type, class, enum, const, constant, traits, literal, variable, interface, property, field, attributes, method, function 2) output them following below json format: \n[{}]. 3) don't output any other words except the json array 4) output symbol names with full-qualified names excluding package name or module name",
        SYMBOL_JSON_FORMAT
    )
}
