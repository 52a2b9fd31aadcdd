use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use eventsource_client::Client;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lemma-cli")]
#[command(about = "CLI tool for the Lemma proof tutoring server")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "http://localhost:8082")]
    server_url: String,

    /// Enable debug mode
    #[arg(long, short, default_value = "false")]
    debug: bool,

    /// Config file path
    #[arg(long, env = "LEMMA_CONFIG", default_value = "~/.lemma/config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 创建一个新的证明会话
    Create {
        /// 证明问题陈述
        problem: String,
        /// 不要求 teacher 展示详细步骤
        #[arg(long, default_value = "false")]
        no_steps: bool,
        /// 归属用户 ID
        #[arg(long)]
        user_id: Option<String>,
    },
    /// 查看会话快照（含全部消息）
    Show {
        /// 会话 ID
        session_id: String,
    },
    /// 列出会话
    List {
        /// 按用户过滤
        #[arg(long)]
        user_id: Option<String>,
        /// 按状态过滤 (in-progress / proof-completed / feedback-submitted)
        #[arg(long)]
        status: Option<String>,
        /// 最多返回条数
        #[arg(long)]
        limit: Option<usize>,
    },
    /// 订阅会话的 SSE 消息流
    Watch {
        /// 会话 ID
        session_id: String,
    },
    /// 向会话追加一条消息（producer 回调）
    Append {
        /// 会话 ID
        session_id: String,
        /// 消息内容
        content: String,
        /// 消息角色 (student / teacher / definitions)
        #[arg(long, default_value = "teacher")]
        role: String,
        /// 消息类型 (definition / proof / critique / default)
        #[arg(long, default_value = "default")]
        kind: String,
    },
    /// 标记会话证明完成（producer 回调）
    Complete {
        /// 会话 ID
        session_id: String,
    },
    /// 为已完成的会话提交反馈
    Feedback {
        /// 会话 ID
        session_id: String,
        /// 评分 1-4
        score: u8,
        /// 可选的文字备注
        #[arg(long)]
        notes: Option<String>,
    },
    /// 配置管理命令
    Config(ConfigArgs),
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// 获取配置值
    Get {
        /// 配置键 (如: server.port, storage.path)
        key: String,
    },
    /// 设置配置值
    Set {
        /// 配置键 (如: server.port, storage.path)
        key: String,
        /// 配置值
        value: String,
    },
    /// 初始化默认配置
    Init {
        /// 强制覆盖已有配置
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// 显示当前配置
    Show,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    problem: String,
    show_steps: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct AppendMessageRequest {
    role: String,
    #[serde(rename = "type")]
    kind: String,
    content: String,
}

#[derive(Serialize)]
struct FeedbackRequest {
    feedback: FeedbackPayload,
}

#[derive(Serialize)]
struct FeedbackPayload {
    score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SessionResponse {
    session: SessionView,
}

#[derive(Deserialize, Debug)]
struct SessionListResponse {
    sessions: Vec<SessionView>,
    total: usize,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    id: String,
    problem: String,
    status: String,
    messages: Vec<MessageView>,
    #[serde(default)]
    feedback: Option<FeedbackView>,
    #[serde(default)]
    user_id: Option<String>,
    created_at: String,
}

#[derive(Deserialize, Debug)]
struct MessageView {
    role: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    content: String,
}

#[derive(Deserialize, Debug)]
struct FeedbackView {
    score: u8,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    error: String,
    code: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        eprintln!("{}", "[DEBUG] Debug mode enabled".dimmed());
        eprintln!("{}", format!("[DEBUG] Server URL: {}", cli.server_url).dimmed());
    }

    match cli.command {
        Commands::Create {
            problem,
            no_steps,
            user_id,
        } => create_session(&cli.server_url, &problem, !no_steps, user_id, cli.debug).await,
        Commands::Show { session_id } => show_session(&cli.server_url, &session_id, cli.debug).await,
        Commands::List {
            user_id,
            status,
            limit,
        } => list_sessions(&cli.server_url, user_id, status, limit, cli.debug).await,
        Commands::Watch { session_id } => watch_session(&cli.server_url, &session_id, cli.debug).await,
        Commands::Append {
            session_id,
            content,
            role,
            kind,
        } => append_message(&cli.server_url, &session_id, &role, &kind, &content, cli.debug).await,
        Commands::Complete { session_id } => {
            complete_session(&cli.server_url, &session_id, cli.debug).await
        }
        Commands::Feedback {
            session_id,
            score,
            notes,
        } => submit_feedback(&cli.server_url, &session_id, score, notes, cli.debug).await,
        Commands::Config(args) => handle_config(args, &cli.config, cli.debug).await,
    }
}

/// 打印服务端错误响应并退出码 1
async fn print_error(response: reqwest::Response, debug: bool) -> anyhow::Result<()> {
    let status = response.status();
    let text = response.text().await?;

    if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
        println!("{}", format!("❌ {} ({})", body.error, body.code).red());
    } else {
        println!("{}", format!("❌ Error: {}", status).red());
        if debug {
            eprintln!("{}", format!("[DEBUG] Error body: {}", text).dimmed());
        }
    }
    std::process::exit(1);
}

fn print_session(session: &SessionView) {
    println!("{}", format!("Session: {}", session.id).cyan().bold());
    println!("{}", format!("  Problem: {}", session.problem));
    println!("{}", format!("  Status:  {}", session.status).yellow());
    if let Some(ref user_id) = session.user_id {
        println!("{}", format!("  User:    {}", user_id).dimmed());
    }
    println!("{}", format!("  Created: {}", session.created_at).dimmed());

    if !session.messages.is_empty() {
        println!();
        for message in &session.messages {
            let label = match message.role.as_str() {
                "student" => message.role.cyan().bold(),
                "teacher" => message.role.green().bold(),
                _ => message.role.normal().bold(),
            };
            let kind = message.kind.as_deref().unwrap_or("default");
            println!("{} {}", label, format!("[{}]", kind).dimmed());
            println!("{}", message.content);
            println!();
        }
    }

    if let Some(ref feedback) = session.feedback {
        println!("{}", format!("⭐ Feedback: {}/4", feedback.score).yellow());
        if let Some(ref notes) = feedback.notes {
            println!("{}", format!("   {}", notes).dimmed());
        }
    }
}

async fn create_session(
    server_url: &str,
    problem: &str,
    show_steps: bool,
    user_id: Option<String>,
    debug: bool,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let request = CreateSessionRequest {
        problem: problem.to_string(),
        show_steps,
        user_id,
    };

    let url = format!("{}/api/v1/sessions", server_url);

    if debug {
        eprintln!("{}", format!("[DEBUG] POST {}", url).dimmed());
        eprintln!(
            "{}",
            format!("[DEBUG] Request body: {}", serde_json::to_string(&request)?).dimmed()
        );
    }

    println!("{}", format!("🚀 Creating session: {}", problem).cyan());

    let response = client.post(&url).json(&request).send().await?;

    if !response.status().is_success() {
        return print_error(response, debug).await;
    }

    let body: SessionResponse = response.json().await?;
    println!("{}", format!("✅ Session ID: {}", body.session.id).green());
    println!(
        "{}",
        format!(
            "📡 Stream: {}/api/v1/sessions/{}/stream",
            server_url, body.session.id
        )
        .dimmed()
    );
    Ok(())
}

async fn show_session(server_url: &str, session_id: &str, debug: bool) -> anyhow::Result<()> {
    let url = format!("{}/api/v1/sessions/{}", server_url, session_id);

    if debug {
        eprintln!("{}", format!("[DEBUG] GET {}", url).dimmed());
    }

    let client = reqwest::Client::new();
    let response = client.get(&url).send().await?;

    if !response.status().is_success() {
        return print_error(response, debug).await;
    }

    let body: SessionResponse = response.json().await?;
    print_session(&body.session);
    Ok(())
}

async fn list_sessions(
    server_url: &str,
    user_id: Option<String>,
    status: Option<String>,
    limit: Option<usize>,
    debug: bool,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/sessions", server_url);

    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(user_id) = user_id {
        query.push(("userId", user_id));
    }
    if let Some(status) = status {
        query.push(("status", status));
    }
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }

    if debug {
        eprintln!("{}", format!("[DEBUG] GET {} {:?}", url, query).dimmed());
    }

    let response = client.get(&url).query(&query).send().await?;

    if !response.status().is_success() {
        return print_error(response, debug).await;
    }

    let body: SessionListResponse = response.json().await?;
    println!("{}", format!("📋 {} session(s)", body.total).cyan().bold());
    println!();

    for session in &body.sessions {
        println!(
            "{} {} {}",
            session.id.green(),
            format!("[{}]", session.status).yellow(),
            session.problem
        );
    }
    Ok(())
}

async fn watch_session(server_url: &str, session_id: &str, debug: bool) -> anyhow::Result<()> {
    let stream_url = format!("{}/api/v1/sessions/{}/stream", server_url, session_id);

    if debug {
        eprintln!("{}", format!("[DEBUG] Connecting SSE: {}", stream_url).dimmed());
    }

    println!("{}", format!("📡 Watching session: {}", session_id).cyan());
    println!("{}", "─".repeat(50).dimmed());

    let sse_client = eventsource_client::ClientBuilder::for_url(&stream_url)?.build();
    let mut stream = sse_client.stream();
    let mut event_count = 0;

    while let Some(event) = stream.next().await {
        match event {
            Ok(eventsource_client::SSE::Event(event)) => {
                event_count += 1;

                if debug {
                    eprintln!(
                        "{}",
                        format!("[DEBUG] Raw event {}: {}", event_count, event.data).dimmed()
                    );
                }

                match serde_json::from_str::<MessageView>(&event.data) {
                    Ok(message) => {
                        let label = match message.role.as_str() {
                            "student" => message.role.cyan().bold(),
                            "teacher" => message.role.green().bold(),
                            _ => message.role.normal().bold(),
                        };
                        println!("{}: {}", label, message.content);
                    }
                    Err(e) => {
                        if debug {
                            eprintln!(
                                "{}",
                                format!("[DEBUG] Failed to parse event: {}", e).dimmed()
                            );
                        }
                    }
                }
            }
            Ok(eventsource_client::SSE::Comment(comment)) => {
                if debug {
                    eprintln!("{}", format!("[DEBUG] SSE Comment: {}", comment).dimmed());
                }
            }
            Err(e) => {
                if debug {
                    eprintln!("{}", format!("[DEBUG] SSE Error: {:?}", e).dimmed());
                }
                // 服务器在会话完成时关闭流，连接断开是正常结束
                break;
            }
        }
    }

    println!("{}", "─".repeat(50).dimmed());
    println!(
        "{}",
        format!("✨ Stream ended ({} message(s))", event_count).cyan()
    );
    Ok(())
}

async fn append_message(
    server_url: &str,
    session_id: &str,
    role: &str,
    kind: &str,
    content: &str,
    debug: bool,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/sessions/{}/messages", server_url, session_id);
    let request = AppendMessageRequest {
        role: role.to_string(),
        kind: kind.to_string(),
        content: content.to_string(),
    };

    if debug {
        eprintln!("{}", format!("[DEBUG] POST {}", url).dimmed());
        eprintln!(
            "{}",
            format!("[DEBUG] Request body: {}", serde_json::to_string(&request)?).dimmed()
        );
    }

    let response = client.post(&url).json(&request).send().await?;

    if !response.status().is_success() {
        return print_error(response, debug).await;
    }

    println!("{}", format!("✅ Appended {} message", role).green());
    Ok(())
}

async fn complete_session(server_url: &str, session_id: &str, debug: bool) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/sessions/{}/complete", server_url, session_id);

    if debug {
        eprintln!("{}", format!("[DEBUG] POST {}", url).dimmed());
    }

    let response = client.post(&url).send().await?;

    if !response.status().is_success() {
        return print_error(response, debug).await;
    }

    let body: SessionResponse = response.json().await?;
    println!(
        "{}",
        format!("✅ Session {} is now {}", session_id, body.session.status).green()
    );
    Ok(())
}

async fn submit_feedback(
    server_url: &str,
    session_id: &str,
    score: u8,
    notes: Option<String>,
    debug: bool,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/sessions/{}", server_url, session_id);
    let request = FeedbackRequest {
        feedback: FeedbackPayload { score, notes },
    };

    if debug {
        eprintln!("{}", format!("[DEBUG] PATCH {}", url).dimmed());
        eprintln!(
            "{}",
            format!("[DEBUG] Request body: {}", serde_json::to_string(&request)?).dimmed()
        );
    }

    let response = client.patch(&url).json(&request).send().await?;

    if !response.status().is_success() {
        return print_error(response, debug).await;
    }

    println!(
        "{}",
        format!("⭐ Feedback submitted: {}/4 for session {}", score, session_id).green()
    );
    Ok(())
}

async fn handle_config(args: ConfigArgs, config_path: &str, debug: bool) -> anyhow::Result<()> {
    use lemma_config::{Config, ConfigManager};

    // 展开配置文件路径
    let config_path =
        lemma_config::expand_tilde(config_path).unwrap_or_else(|| PathBuf::from(config_path));

    if debug {
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.get().read().await.clone();

            match config.get_value(&key) {
                Some(value) => {
                    println!("{}", format!("{} = {}", key, value).green());
                }
                None => {
                    println!("{}", format!("❌ Key not found: {}", key).red());
                    std::process::exit(1);
                }
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(&config_path).await?;

            manager
                .update(|config| {
                    if let Err(e) = config.set_value(&key, &value) {
                        eprintln!("{}", format!("❌ Failed to set value: {}", e).red());
                        std::process::exit(1);
                    }
                })
                .await?;

            manager.save().await?;
            println!("{}", format!("✅ Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!(
                    "{}",
                    format!("⚠️  Config already exists at {:?}", config_path).yellow()
                );
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            lemma_config::init_lemma_dirs().await?;

            let default_config = Config::default();
            let manager = ConfigManager::new(default_config, config_path.clone());
            manager.save().await?;

            println!(
                "{}",
                format!("✅ Config initialized at {:?}", config_path).green()
            );
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.get().read().await.clone();

            println!("{}", "📋 Current Configuration:".cyan().bold());
            println!();

            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
