use anyhow::Result;

fn main() -> Result<()> {
    hvmbench_cli::run()
}
