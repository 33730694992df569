//! Output formatting utilities.

use colored::Colorize;
use hdforge_types::SingleAddress;
use tabled::{Table, Tabled};

/// Render a stored hex address as Bech32m, or leave it as is if it does not parse.
pub fn format_address(hash: &str) -> String {
    SingleAddress::from_hex(hash)
        .map(|address| address.to_string())
        .unwrap_or_else(|_| hash.to_string())
}

/// Format a derivation index, marking hardened ones with `'`.
pub fn format_index(index: u32) -> String {
    if hdforge_types::constants::is_hardened(index) {
        format!("{}'", index - hdforge_types::constants::HARD_DERIVATION_START)
    } else {
        index.to_string()
    }
}

/// Format a derivation path as `m/1852'/1815'/0'`.
pub fn format_path(indices: &[u32]) -> String {
    let mut path = String::from("m");
    for index in indices {
        path.push('/');
        path.push_str(&format_index(*index));
    }
    path
}

/// Print success message.
pub fn print_success(msg: &str) {
    println!("{}", format!("✓ {}", msg).green());
}

/// Print error message.
pub fn print_error(msg: &str) {
    eprintln!("{}", format!("✗ {}", msg).red());
}

/// Print warning message.
pub fn print_warning(msg: &str) {
    println!("{}", format!("⚠ {}", msg).yellow());
}

/// Print info message.
pub fn print_info(msg: &str) {
    println!("{}", format!("ℹ {}", msg).blue());
}

/// Print the addresses of one chain.
pub fn print_address_table(title: &str, cutoff: Option<u32>, addresses: &[(u32, String)]) {
    #[derive(Tabled)]
    struct AddressRow {
        index: u32,
        address: String,
    }

    let cutoff = cutoff.map_or_else(|| "none".to_string(), |c| c.to_string());
    println!("{} (display cutoff: {})", title.bold(), cutoff.bright_yellow());

    let rows: Vec<AddressRow> = addresses
        .iter()
        .map(|(index, hash)| AddressRow {
            index: *index,
            address: format_address(hash),
        })
        .collect();
    println!("{}", Table::new(rows));
}
