use clap::Parser;
use kgraph_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	kgraph_worker::run(args).await
}
