use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "pki.pest"]
pub struct PkiParser;
