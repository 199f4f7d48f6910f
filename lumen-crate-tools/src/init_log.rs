use std::io::Write;

use anstyle::{AnsiColor, Color, RgbColor, Style};

/// 日志中 target 的最大宽度，超出时只保留末尾
const TARGET_WIDTH: usize = 24;

fn level_color(level: log::Level) -> Option<Color> {
    let color = match level {
        log::Level::Error => AnsiColor::Red,
        log::Level::Warn => AnsiColor::Yellow,
        log::Level::Info => AnsiColor::Green,
        log::Level::Debug => AnsiColor::Cyan,
        log::Level::Trace => return None,
    };
    Some(Color::Ansi(color))
}

/// `lumen_renderer::renderer` -> `renderer::renderer`
fn short_target(target: &str) -> &str {
    let target = target.strip_prefix("lumen_").unwrap_or(target);
    match target.char_indices().rev().nth(TARGET_WIDTH - 1) {
        Some((idx, _)) => &target[idx..],
        None => target,
    }
}

/// 安装全局 logger
///
/// 默认 Info 级别，可以通过 `RUST_LOG` 覆盖，例如 `RUST_LOG=lumen_renderer=debug` 打开每帧统计。
/// 重复调用时什么也不做。
pub fn init_log() {
    let result = env_logger::Builder::new()
        .format(|buf, record| {
            let level = record.level();
            let level_style = buf.default_level_style(level).fg_color(level_color(level));
            let grey_style = Style::new().fg_color(Some(Color::Rgb(RgbColor(110, 110, 110))));

            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let target = short_target(record.target());

            writeln!(
                buf,
                "{level_style}[{time}] {level:<5}{level_style:#} {grey_style}{target:>width$}{grey_style:#} {}",
                record.args(),
                width = TARGET_WIDTH,
            )
        })
        .filter(None, log::LevelFilter::Info)
        .parse_default_env()
        .try_init();

    if result.is_err() {
        log::debug!("logger already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_drops_crate_prefix() {
        assert_eq!(short_target("lumen_renderer::renderer"), "renderer::renderer");
        assert_eq!(short_target("winit"), "winit");
    }

    #[test]
    fn long_target_keeps_tail() {
        let target = short_target("lumen_render_interface::frame_ring::inner");
        assert_eq!(target.chars().count(), TARGET_WIDTH);
        assert!(target.ends_with("frame_ring::inner"));
    }
}
