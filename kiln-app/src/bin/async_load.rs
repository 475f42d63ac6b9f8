use kiln_app::app::AsyncLoadApp;
use kiln_crate_tools::config::EngineConfig;
use kiln_crate_tools::resource::KilnPath;

fn main() -> anyhow::Result<()> {
    let config = EngineConfig::load_or_default(KilnPath::config_path())?;
    AsyncLoadApp::init_env(&config);

    let mut paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        paths.push("demo/crate.model".to_string());
    }

    let mut app = AsyncLoadApp::new(config)?;
    for path in paths {
        if let Err(e) = app.request(&path) {
            log::error!("{:#}", e);
        }
    }

    app.run();
    app.log_summary();

    log::info!("end run.");
    app.destroy();
    Ok(())
}
