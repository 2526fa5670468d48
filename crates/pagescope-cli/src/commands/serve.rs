use crate::CaptureArgs;
use anyhow::Result;
use pagescope_browser::PageAnalyzer;
use pagescope_server::AnalysisServer;
use std::net::{IpAddr, SocketAddr};

/// Run the HTTP endpoint until Ctrl+C
pub fn execute(host: IpAddr, port: u16, capture: &CaptureArgs) -> Result<()> {
    let config = capture.resolve_config()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let engine = capture.engine(&config).await?;
        let analyzer = PageAnalyzer::new(engine, config)?;
        let server = AnalysisServer::bind(SocketAddr::new(host, port), analyzer).await?;

        println!("✓ pagescope listening on http://{}", server.local_addr()?);
        println!();
        println!("Analyze a page with:");
        println!(
            "  curl -X POST http://{}/analyze -H 'content-type: application/json' -d '{{\"url\": \"https://example.com\"}}'",
            server.local_addr()?
        );
        println!();
        println!("Press Ctrl+C to stop...");

        server.run().await?;
        println!("✅ Server stopped gracefully");
        Ok(())
    })
}
