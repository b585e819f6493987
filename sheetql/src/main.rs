#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    sheetql::cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("sheetql was built without the `cli` feature");
}
