use rustc_demangle::try_demangle;

/// Demangle a Rust symbol name, dropping the trailing hash.
/// Returns the input unchanged when it is not a mangled Rust symbol.
pub fn demangle_symbol(symbol: &str) -> String {
    match try_demangle(symbol) {
        Ok(demangled) => format!("{:#}", demangled),
        Err(_) => symbol.to_string(),
    }
}
