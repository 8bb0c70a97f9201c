use clap::Parser;
use std::path::PathBuf;
use webai_extractor_cli::{Cli, Commands};

fn parse(argv: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(std::iter::once("webai-extract").chain(argv.iter().copied()))
}

#[test]
fn test_extract_defaults() {
    let cli = parse(&["extract", "--schema", "product.json"]).unwrap();
    let Commands::Extract(args) = cli.command else {
        panic!("expected extract");
    };

    assert_eq!(args.input.html, "-");
    assert_eq!(args.input.width, 80);
    assert_eq!(args.schema, PathBuf::from("product.json"));
    assert_eq!(args.max_tries, 5);
    assert_eq!(args.model_program, "llm");
    assert!(args.model_bin.is_none());
    assert!(!args.argument);
}

#[test]
fn test_extract_requires_schema() {
    assert!(parse(&["extract", "--html", "page.html"]).is_err());
}

#[test]
fn test_prompt_flags_conflict() {
    assert!(parse(&[
        "extract",
        "--schema",
        "s.json",
        "--prompt",
        "inline",
        "--prompt-file",
        "p.txt",
    ])
    .is_err());
}

#[test]
fn test_transport_flags_conflict() {
    assert!(parse(&["extract", "--schema", "s.json", "--stdin", "--argument"]).is_err());
}

#[test]
fn test_example_flags_come_in_pairs() {
    assert!(parse(&["extract", "--schema", "s.json", "--example-input", "x"]).is_err());
    assert!(parse(&[
        "extract",
        "--schema",
        "s.json",
        "--example-input",
        "x",
        "--example-output",
        "{}",
    ])
    .is_ok());
}

#[test]
fn test_text_and_schema_subcommands() {
    let cli = parse(&["text", "--html", "page.html", "--width", "0"]).unwrap();
    assert!(matches!(cli.command, Commands::Text(ref a) if a.input.width == 0));

    let cli = parse(&["schema", "--schema", "s.json"]).unwrap();
    assert!(matches!(cli.command, Commands::Schema(_)));
}
