fn main() -> anyhow::Result<()> {
    clientbook::cli::run()
}
