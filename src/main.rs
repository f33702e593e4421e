// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # webfront 宿主服务器
//!
//! 基于 Tokio 运行时的多线程 HTTP 宿主，负责把框架前缀下的请求交给分发器：
//! - 读取并解析 HTTP/1.x 报文（含表单与 multipart 请求体）
//! - 请求过滤：只有 `framework_prefixes` 下的路径进入分发器，其余返回 404
//! - 在阻塞线程池中执行处理函数，超时返回 504
//! - 转发结果交给视图引擎渲染
//! - 后台管理控制台（CLI 指令交互）

mod controllers;

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::Notify,
    time,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use webfront::{
    request, Config, Dispatcher, DispatcherOptions, HtmlBuilder, HttpRequestMethod, Reply, Request,
    Response, RouteTable, TemplateViewEngine,
};

/// 单次读取的块大小
const READ_CHUNK: usize = 4096;

/// 每个连接共享的只读状态
struct Host {
    config: Config,
    dispatcher: Dispatcher,
    views: TemplateViewEngine,
}

fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
        return;
    }

    // 2. 环境配置加载：从 TOML 文件读取运行参数，失败时回退到默认值
    let config = match Config::from_toml("config/development.toml") {
        Ok(config) => {
            info!("配置文件已载入");
            config
        }
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };
    info!("挂载前缀：{}，视图目录：{}", config.mount_prefix(), config.view_root());

    // 3. 路由表：启动阶段一次性注册，交给分发器后即封存
    let table = match RouteTable::from_registrations(controllers::registrations()) {
        Ok(table) => table,
        Err(e) => {
            error!("路由注册失败：{}", e);
            return;
        }
    };
    info!("共注册{}条路由", table.len());
    let dispatcher = Dispatcher::new(table, DispatcherOptions::from(&config));
    let views = TemplateViewEngine::new(config.view_root());

    // 4. 异步运行时：根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            return;
        }
    };

    let host = Arc::new(Host {
        config,
        dispatcher,
        views,
    });
    runtime.block_on(serve(host));
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("服务器已关闭");
}

async fn serve(host: Arc<Host>) {
    // 网络层初始化：全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
    let port = host.config.port();
    let address = match host.config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}:{}上监听Socket连接", address, port);
    let listener = match TcpListener::bind(SocketAddrV4::new(address, port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("端口{}绑定完成", port);

    // shutdown: 控制台发出的停机信号
    // active_connection: 当前并发连接数
    let shutdown = Arc::new(Notify::new());
    let active_connection = Arc::new(AtomicU32::new(0));

    tokio::spawn(console(
        Arc::clone(&shutdown),
        Arc::clone(&active_connection),
        Arc::clone(&host),
    ));

    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = tokio::select! {
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let host = Arc::clone(&host);
        let active_connection = Arc::clone(&active_connection);
        tokio::spawn(async move {
            active_connection.fetch_add(1, Ordering::SeqCst);
            handle_connection(&mut stream, id, host).await;
            active_connection.fetch_sub(1, Ordering::SeqCst);
        });
        id += 1;
    }
}

/// 后台管理控制台：stop / status / routes / help
async fn console(shutdown: Arc<Notify>, active_connection: Arc<AtomicU32>, host: Arc<Host>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                shutdown.notify_one();
                println!("停机指令已激活，服务器将停止接受新连接...");
                break;
            }
            "status" => {
                println!("== webfront 状态 ===");
                println!("当前活跃连接数: {}", active_connection.load(Ordering::SeqCst));
                println!("已注册路由数: {}", host.dispatcher.table().len());
                println!("====================");
            }
            "routes" => {
                println!("== 路由表（按匹配优先级）==");
                for signature in host.dispatcher.table().signatures() {
                    println!("{}", signature);
                }
                println!("====================");
            }
            "help" => {
                println!("== webfront Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("routes - 列出所有已注册路由");
                println!("help   - 显示此帮助信息");
                println!("====================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

/// 读取完整的请求报文。超过 `max_request_bytes` 时返回 `Err(())`。
async fn read_request(stream: &mut TcpStream, id: u128, limit: usize) -> Result<Vec<u8>, ()> {
    let mut buffer = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > limit {
                    warn!("[ID{}]请求报文超过{}字节上限", id, limit);
                    return Err(());
                }
                if request::is_complete(&buffer) {
                    break;
                }
            }
            Err(e) => {
                error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
                break;
            }
        }
    }
    Ok(buffer)
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期：读取解析请求、过滤、分发、渲染并发送响应。
async fn handle_connection(stream: &mut TcpStream, id: u128, host: Arc<Host>) {
    let buffer = match read_request(stream, id, host.config.max_request_bytes()).await {
        Ok(buffer) if buffer.is_empty() => return,
        Ok(buffer) => buffer,
        Err(()) => {
            send(stream, id, Response::from_status_code(413, &[], id)).await;
            return;
        }
    };
    debug!("[ID{}]HTTP请求接收完毕，共{}字节", id, buffer.len());

    let start_time = Instant::now();

    // 1. 协议解析
    let request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}", id, e);
            send(stream, id, Response::from_status_code(e.status_code(), &[], id)).await;
            return;
        }
    };

    // 2. 请求过滤：框架前缀之外的路径不进入分发器
    let response = if host.config.is_framework_path(request.path()) {
        let reply = dispatch(&host, &request, id).await;
        match reply {
            Some(reply) => Response::from_reply(&reply, &request, &host.views, id),
            None => Response::from_status_code(504, request.accept_encoding(), id),
        }
    } else {
        debug!("[ID{}]{}不在框架前缀内", id, request.path());
        Response::from_status_code(404, request.accept_encoding(), id)
    };
    let response = match request.method() {
        HttpRequestMethod::Head => response.without_body(),
        _ => response,
    };

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );
    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, ",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    send(stream, id, response).await;
}

/// 在阻塞线程池中执行分发，超时返回 `None`。
///
/// 超时后处理函数所在的线程不会被打断，只是其结果被丢弃。
async fn dispatch(host: &Arc<Host>, request: &Request, id: u128) -> Option<Reply> {
    let dispatch_request = request.to_dispatch_request(id);
    let worker = Arc::clone(host);
    let task = tokio::task::spawn_blocking(move || worker.dispatcher.dispatch(dispatch_request));

    let joined = match host.config.handler_timeout() {
        Some(limit) => match time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("[ID{}]处理函数在{}ms内未返回", id, limit.as_millis());
                return None;
            }
        },
        None => task.await,
    };
    match joined {
        Ok(reply) => Some(reply),
        Err(e) => {
            error!("[ID{}]分发任务异常终止：{}", id, e);
            Some(Reply::Html {
                status: 500,
                body: HtmlBuilder::from_status_code(500, None).build(),
            })
        }
    }
}

async fn send(stream: &mut TcpStream, id: u128, response: Response) {
    let bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, bytes.len());
    if let Err(e) = stream.write_all(&bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}
