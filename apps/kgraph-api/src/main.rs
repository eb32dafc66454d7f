use clap::Parser;
use kgraph_api::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	kgraph_api::run(args).await
}
