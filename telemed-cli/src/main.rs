//! 远程医疗工作台命令行客户端

mod commands;
mod config;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::commands::App;
use crate::config::TelemedConfig;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "telemed")]
#[command(about = "远程医疗工作台：患者、预约与问诊记录管理")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 远程服务地址，覆盖配置文件
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// 调用者身份，覆盖配置文件
    #[arg(short, long, global = true)]
    principal: Option<String>,

    /// 使用进程内存储，不连接远程服务
    #[arg(long, global = true)]
    offline: bool,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 登录并显示档案状态
    Login,
    /// 调用者档案
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// 仪表盘概览
    Dashboard,
    /// 患者管理
    Patients {
        #[command(subcommand)]
        action: PatientsAction,
    },
    /// 预约管理
    Appointments {
        #[command(subcommand)]
        action: AppointmentsAction,
    },
    /// 问诊会话
    Consult {
        #[command(subcommand)]
        action: ConsultAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    Show,
    /// 首次登录时填写档案
    Setup {
        #[arg(long)]
        name: String,
        /// 默认为 Doctor
        #[arg(long)]
        role: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PatientsAction {
    List {
        /// 按姓名过滤，忽略大小写
        #[arg(long, default_value = "")]
        search: String,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: u64,
        #[arg(long, default_value = "")]
        history: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AppointmentsAction {
    List,
    Schedule {
        #[arg(long)]
        patient: String,
        /// 本地时间，例如 2024-03-15T09:30
        #[arg(long)]
        time: String,
        #[arg(long)]
        reason: String,
    },
    Cancel {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConsultAction {
    /// 为预约创建问诊会话
    Start {
        appointment_id: String,
    },
    Show {
        session_id: String,
    },
    /// 更新问诊记录，未给出的字段保持不变
    Notes {
        session_id: String,
        #[arg(long)]
        notes: Option<String>,
        /// 传入空字符串清除处方
        #[arg(long)]
        prescription: Option<String>,
        /// 复诊日期 YYYY-MM-DD，传入空字符串清除
        #[arg(long)]
        follow_up: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TelemedConfig::load(args.config.as_deref())?;
    if let Some(url) = args.backend_url {
        config.backend.url = url;
    }
    if let Some(principal) = args.principal {
        config.identity.principal = principal;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .with_writer(std::io::stderr)
        .init();

    config.validate(args.offline)?;
    if args.offline {
        info!("Running offline with an in-process store");
    } else {
        info!("Using backend at {}", config.backend.url);
    }

    let app = App::new(&config, args.offline)?;
    if let Err(e) = app.run(args.command).await {
        error!("Command failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}
