use clap::Parser;
use coinfold_core::config::AppConfig;
use std::error::Error;
use std::path::PathBuf;

/// 个人加密资产组合聚合服务
#[derive(Parser, Debug, Default)]
#[command(name = "coinfold", version, about)]
pub struct Args {
    /// 监听端口
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// 账户文件目录
    #[arg(short = 's', long = "store")]
    pub store_dir: Option<String>,

    /// 输出调试日志
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// 配置文件路径，缺省时读取工作目录下可选的 coinfold.toml
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

/// # Summary
/// 按优先级合并配置：内置默认值 → 配置文件 → `COINFOLD__` 环境变量 → 命令行参数。
///
/// # Returns
/// 校验通过的配置。
pub fn load(args: &Args) -> Result<AppConfig, Box<dyn Error>> {
    let file = match &args.config {
        Some(path) => config::File::from(path.as_path()).required(true),
        None => config::File::with_name("coinfold").required(false),
    };
    let mut cfg: AppConfig = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix("COINFOLD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    if let Some(port) = args.port {
        cfg.server.port = port;
    }
    if let Some(dir) = &args.store_dir {
        cfg.store.dir = dir.clone();
    }

    cfg.validate()?;
    Ok(cfg)
}
