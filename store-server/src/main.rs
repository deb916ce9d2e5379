use store_server::{Config, Server, ServerState, init_logger, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 日志)
    dotenv::dotenv().ok();
    init_logger();

    // 打印横幅
    print_banner();

    tracing::info!("Storefront server starting...");

    // 2. 加载配置
    let config = Config::from_env();

    // 3. 初始化服务器状态
    let state = ServerState::initialize(&config).await?;

    // 4. 启动 HTTP 服务器 (Server::run 会自动启动后台任务)
    let server = Server::with_state(config, state);
    server.run().await
}
