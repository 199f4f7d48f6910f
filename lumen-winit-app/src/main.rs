mod app;
mod demo_scene;
mod input;

use lumen_crate_tools::config::EngineConfig;
use lumen_crate_tools::init_log::init_log;
use lumen_crate_tools::resource::LumenPath;

use crate::app::WinitApp;

fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
}

fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(panic_handler));
    init_log();

    tracy_client::Client::start();
    tracy_client::set_thread_name!("RenderThread");

    // 命令行参数可以指定配置文件，否则使用工作区根目录下的 lumen.toml
    let config_path = std::env::args()
        .nth(1)
        .map(Into::into)
        .unwrap_or_else(|| LumenPath::config_path(EngineConfig::DEFAULT_FILE_NAME));
    let config = EngineConfig::load(&config_path)?;

    WinitApp::run(config)
}
