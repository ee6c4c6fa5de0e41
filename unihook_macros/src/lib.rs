//! Compile-time byte-pattern literals.
//!
//! Generalizes the old `sig!` idea (a hex literal where `??` marks a wildcard byte) into a
//! macro that expands to a `(pattern, mask)` pair instead of a single masked byte array, since
//! the scanner needs the pattern and the don't-care mask as separate operands for its SIMD
//! compare.

use proc_macro::TokenStream;
use quote::quote;

/// `pattern!(48 8D 05 ?? ?? ?? ?? 48 89 00)` expands to `(&[u8; N], &[u8; N])`: the first array
/// has `0x00` at wildcard positions, the second has `0xFF` at fixed positions and `0x00` at
/// wildcard positions.
///
/// # Panics
/// Panics at macro-expansion time if a token is not a valid hex byte or `??`.
#[proc_macro]
pub fn pattern(input: TokenStream) -> TokenStream {
    let input = input.to_string();

    let mut bytes = Vec::new();
    let mut mask = Vec::new();
    for tok in input.split_ascii_whitespace() {
        if tok == "??" || tok == "?" {
            bytes.push(0u8);
            mask.push(0u8);
        } else {
            let b = u8::from_str_radix(tok, 16)
                .unwrap_or_else(|_| panic!("pattern!: `{tok}` is not a hex byte or `??`"));
            bytes.push(b);
            mask.push(0xFFu8);
        }
    }

    quote! {
        (&[#(#bytes),*], &[#(#mask),*])
    }
    .into()
}
