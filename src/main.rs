//! 运维门户命令行入口
//! 登录页与仪表板在终端中的对应实现

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use ops_portal::{
    app::Portal,
    config::AppConfig,
    error::AuthError,
    guard::{Navigation, Route},
    models::user::User,
    shell::LoginOutcome,
    telemetry,
};
use secrecy::{ExposeSecret, Secret};

#[derive(Debug, Parser)]
#[command(name = "ops-portal", version, about = "运维门户命令行客户端")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 登录并保存凭证
    Login {
        #[arg(short, long)]
        username: String,
        /// 不提供时从标准输入读取
        #[arg(short, long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// 注册新用户
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// 打开仪表板（需要登录）
    Dashboard,
    /// 按路径导航，例如 /profile
    Open { path: String },
    /// 刷新访问令牌
    Refresh,
    /// 登出并清除本地凭证
    Logout,
    /// 显示当前会话状态
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env.development > .env
    if let Ok(name) = std::env::var("PORTAL_ENV") {
        dotenv::from_filename(format!(".env.{}", name)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&config);

    let portal = Portal::from_config(config).context("Failed to initialize HTTP client")?;
    let shell = &portal.shell;
    shell.restore();

    match cli.command {
        Command::Login { username, password } => {
            let password = read_password(password)?;
            match shell.login(&username, password.expose_secret()).await {
                Ok(LoginOutcome::Navigated(navigation)) => {
                    println!("登录成功！");
                    render(&portal, navigation).await?;
                }
                Ok(LoginOutcome::Discarded) => {}
                Err(e) => return Err(fail(e)),
            }
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let password = read_password(password)?;
            let user = portal
                .auth
                .register(&username, password.expose_secret(), &email)
                .await
                .map_err(fail)?;
            println!("注册成功：{} <{}>，请登录", user.username, user.email);
        }
        Command::Dashboard => {
            let navigation = shell.navigate(Route::Dashboard);
            render(&portal, navigation).await?;
        }
        Command::Open { path } => {
            let route: Route = path.parse()?;
            let navigation = shell.navigate(route);
            render(&portal, navigation).await?;
        }
        Command::Refresh => match shell.refresh().await {
            Ok(()) => println!("令牌已刷新"),
            Err(e) => {
                println!("会话已失效，跳转到 {}", Route::Login);
                return Err(fail(e));
            }
        },
        Command::Logout => {
            let navigation = shell.logout();
            println!("已退出登录，跳转到 {}", navigation.target());
        }
        Command::Status => {
            println!(
                "会话: {}",
                if shell.state().is_authenticated() {
                    "已登录"
                } else {
                    "未登录"
                }
            );
            println!("凭证文件: {}", portal.config.storage.path.display());
            println!("API: {} ({:?})", portal.config.api.base_url, portal.http.auth_mode());
        }
    }

    Ok(())
}

/// 展示导航结果对应的页面
async fn render(portal: &Portal, navigation: Navigation) -> anyhow::Result<()> {
    if let Navigation::Redirect(route) = navigation {
        println!("跳转到 {}", route);
    }

    match navigation.target() {
        Route::Login => {
            println!("请先登录: ops-portal login -u <用户名>");
        }
        Route::Dashboard | Route::Profile => match portal.shell.current_user().await {
            Ok(user) => print_user(navigation.target(), &user),
            Err(AuthError::Unauthenticated) => {
                println!("登录已失效，跳转到 {}", Route::Login);
            }
            Err(e) => return Err(fail(e)),
        },
        Route::Root | Route::NotFound => {
            println!("页面不存在");
        }
    }
    Ok(())
}

fn print_user(route: Route, user: &User) {
    match route {
        Route::Dashboard => {
            println!("仪表板");
            println!("  欢迎, {}", user.username);
            println!("  角色: {}", user.role_label());
        }
        _ => {
            println!("个人中心");
            println!("  ID:       {}", user.id);
            println!("  用户名:   {}", user.username);
            println!("  邮箱:     {}", user.email);
            println!("  状态:     {}", if user.is_active { "正常" } else { "已禁用" });
            println!("  角色:     {}", user.role_label());
            println!("  创建时间: {}", user.created_at.format("%Y-%m-%d %H:%M:%S"));
            if let Some(updated_at) = user.updated_at {
                println!("  更新时间: {}", updated_at.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
}

/// 从参数、环境变量或终端读取密码（终端输入不回显）
fn read_password(arg: Option<String>) -> anyhow::Result<Secret<String>> {
    if let Some(password) = arg {
        return Ok(Secret::new(password));
    }

    let password = rpassword::prompt_password("密码: ").context("Failed to read password")?;
    Ok(Secret::new(password))
}

fn fail(err: AuthError) -> anyhow::Error {
    tracing::debug!(error = %err, "Command failed");
    anyhow!(err.user_message())
}
