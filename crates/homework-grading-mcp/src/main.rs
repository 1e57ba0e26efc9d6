//! Homework grading MCP server entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use homework_grading::{GradingService, ImageAcquirer, OpenAiCompatibleClient, VisionModel};
use homework_grading_mcp::config::ServerConfig;
use homework_grading_mcp::protocol::ProtocolHandler;
use homework_grading_mcp::tools::ToolRegistry;
use homework_grading_mcp::transport::StdioTransport;
use homework_grading_mcp::types::InitializeResult;

#[derive(Parser)]
#[command(
    name = "homework-grading-mcp",
    about = "MCP server that grades photographed homework with a vision-language model",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). Overrides LOG_LEVEL.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Print server capabilities as JSON.
    Info,

    /// Probe the model endpoint with a trivial prompt.
    Check,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   homework-grading-mcp completions bash > ~/.local/share/bash-completion/completions/homework-grading-mcp
    ///   homework-grading-mcp completions zsh > ~/.zfunc/_homework-grading-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let dotenv = dotenvy::dotenv();
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.log_level.as_deref(), &config))
        .with_writer(std::io::stderr)
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    install_panic_hook();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await?,

        Commands::Info => {
            let init = InitializeResult::for_server(config.implementation());
            let tools = ToolRegistry::list_tools();
            let info = serde_json::json!({
                "server": init.server_info,
                "protocol_version": init.protocol_version,
                "capabilities": init.capabilities,
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
                "model_configured": config.has_api_key(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Check => {
            let Some(model) = build_model(&config) else {
                eprintln!("MODELSCOPE_API_KEY 环境变量未设置");
                std::process::exit(1);
            };
            if model.test_connection().await {
                println!("✅ 模型连接测试通过");
            } else {
                eprintln!("⚠️  模型连接测试失败，请检查API配置");
                std::process::exit(1);
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(
                shell,
                &mut cmd,
                "homework-grading-mcp",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// `RUST_LOG` wins, then `--log-level`, then `LOG_LEVEL`, then `info`.
fn env_filter(cli_level: Option<&str>, config: &ServerConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = cli_level.unwrap_or(&config.log_level);
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        tracing::error!("未捕获的异常: {panic_info}");
        std::process::exit(1);
    }));
}

fn build_model(config: &ServerConfig) -> Option<Arc<dyn VisionModel>> {
    match OpenAiCompatibleClient::new(config.model_config()) {
        Ok(client) => Some(Arc::new(client) as Arc<dyn VisionModel>),
        Err(_) => None,
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!("🚀 启动作业批改MCP服务器 v{}", config.server_version);
    tracing::info!("📋 服务器名称: {}", config.server_name);

    let model = build_model(&config);
    match &model {
        Some(model) => {
            if model.test_connection().await {
                tracing::info!("✅ 模型连接测试通过");
            } else {
                tracing::warn!("⚠️  模型连接测试失败，请检查API配置");
            }
        }
        None => {
            tracing::warn!("⚠️  MODELSCOPE_API_KEY 未配置，模型功能将不可用");
            tracing::warn!("🔑 请在环境变量中设置有效的 MODELSCOPE_API_KEY");
        }
    }

    let service = Arc::new(GradingService::new(ImageAcquirer::new(), model));
    let handler = ProtocolHandler::new(service, config.implementation());
    let transport = StdioTransport::new(handler);

    tracing::info!("✅ MCP服务器启动成功，等待客户端连接...");
    tracing::info!("🔧 可用工具: grade_homework - 智能批改作业（只需上传图片）");

    tokio::select! {
        result = transport.run() => result?,
        signal = shutdown_signal() => tracing::info!("收到{signal}信号，正在关闭服务器..."),
    }

    tracing::info!("✅ 服务器已关闭");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "中断 (SIGINT)",
            _ = sigterm.recv() => "终止 (SIGTERM)",
        },
        Err(e) => {
            tracing::warn!("无法监听 SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
            "中断 (SIGINT)"
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "中断 (SIGINT)"
}
