mod grammar;
pub mod parser;

pub use parser::{
    inspect_private_key, parse_pem, parse_request_id, KeyKind, PemBlock, PrivateKeyInfo,
};
