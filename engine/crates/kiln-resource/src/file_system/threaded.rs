use crate::error::FileError;
use crate::file_system::{FileCompletion, FileSystem, NativeFile};
use anyhow::Context;
use crossbeam_channel::Sender;
use crossbeam_utils::sync::WaitGroup;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;

struct ReadRequest {
    file: NativeFile,
    path: PathBuf,
    size: u64,
    reply: Sender<FileCompletion>,
}

struct OpenFile {
    path: PathBuf,
    size: u64,
}

/// 基于后台线程的文件系统
///
/// ## 架构设计
/// - 内部的 `dispatch-thread` 负责调度：接收读取请求，分发任务到 worker
/// - rayon 提供 worker 线程池
/// - crossbeam 提供线程间通信的 channel
/// - 主线程和 dispatch-thread 之间的通信
///     - request_sender: 发送读取请求
/// - worker 和主线程之间的通信
///     - 每个请求自带的 reply sender，结果回到请求方（manager）的 channel
///
/// # 线程生命周期
/// 当 `ThreadedFileSystem` 被 Drop 时：
/// 1. `request_sender` 被销毁，导致 channel 断开。
/// 2. 后台线程中的 `recv()` 返回错误，退出循环。
/// 3. 线程执行 `wait_group.wait()`，等待所有已分发的读取任务完成。
/// 4. `drop` 调用 `join()` 等待后台线程完全退出。
pub struct ThreadedFileSystem {
    root: PathBuf,

    request_sender: Option<Sender<ReadRequest>>,
    dispatch_thread: Option<thread::JoinHandle<()>>,

    open_files: RefCell<HashMap<NativeFile, OpenFile>>,
    next_file: Cell<u64>,
}

// new & init
impl ThreadedFileSystem {
    /// `io_threads` 为 0 时由 rayon 决定线程数
    pub fn new(root: impl Into<PathBuf>, io_threads: usize) -> anyhow::Result<Self> {
        let (req_tx, req_rx) = crossbeam_channel::unbounded::<ReadRequest>();

        // Rayon 线程池，用于执行实际的读取任务
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(io_threads)
            .thread_name(|index| format!("File-IO-{}", index))
            .build()
            .context("Failed to create file io thread pool")?;

        // 调度线程，负责接收请求并分发任务
        let dispatch_thread = thread::Builder::new()
            .name("FileDispatchThread".to_string())
            .spawn(move || {
                let wait_group = WaitGroup::new();

                while let Ok(req) = req_rx.recv() {
                    // 为每个任务克隆一个 WaitGroup，任务结束时随闭包一起 drop
                    let wg_task = wait_group.clone();

                    pool.spawn(move || {
                        let reply = req.reply.clone();
                        let completion = read_file_task(req);
                        // 请求方已经不在了（manager 被注销），结果直接丢弃
                        let _ = reply.send(completion);

                        drop(wg_task);
                    });
                }

                // 等待所有任务完成
                wait_group.wait();
            })
            .context("Failed to spawn file dispatch thread")?;

        Ok(Self {
            root: root.into(),
            request_sender: Some(req_tx),
            dispatch_thread: Some(dispatch_thread),
            open_files: RefCell::new(HashMap::new()),
            next_file: Cell::new(1),
        })
    }
}
// tools
impl ThreadedFileSystem {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 当前处于打开状态的文件数
    pub fn open_file_count(&self) -> usize {
        self.open_files.borrow().len()
    }

    /// 显式等待所有任务完成并销毁
    /// 实际上只是消耗 self，触发 Drop
    pub fn join(self) {}
}

impl FileSystem for ThreadedFileSystem {
    fn open_async(&self, path: &Path) -> Result<NativeFile, FileError> {
        let full_path = self.root.join(path);
        let metadata = std::fs::metadata(&full_path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => FileError::NotFound(full_path.clone()),
            _ => FileError::Open {
                path: full_path.clone(),
                source,
            },
        })?;
        if !metadata.is_file() {
            return Err(FileError::Open {
                path: full_path,
                source: std::io::Error::new(ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        let file = NativeFile::from_raw(self.next_file.get());
        self.next_file.set(file.id() + 1);
        self.open_files.borrow_mut().insert(
            file,
            OpenFile {
                path: full_path,
                size: metadata.len(),
            },
        );
        Ok(file)
    }

    fn size(&self, file: NativeFile) -> Option<u64> {
        self.open_files.borrow().get(&file).map(|open| open.size)
    }

    fn read_async(&self, file: NativeFile, size: u64, on_complete: Sender<FileCompletion>) {
        let Some(path) = self.open_files.borrow().get(&file).map(|open| open.path.clone()) else {
            let _ = on_complete.send(FileCompletion {
                file,
                result: Err(FileError::Cancelled(PathBuf::new())),
            });
            return;
        };

        if let Some(sender) = &self.request_sender
            && let Err(e) = sender.send(ReadRequest {
                file,
                path,
                size,
                reply: on_complete,
            })
        {
            log::error!("Failed to send file read request: {}", e);
        }
    }

    fn close(&self, file: NativeFile) {
        self.open_files.borrow_mut().remove(&file);
    }
}

impl Drop for ThreadedFileSystem {
    fn drop(&mut self) {
        // 必须先 drop sender，否则 recv 会一直阻塞，导致 join 死锁
        self.request_sender = None;

        log::info!("ThreadedFileSystem is being dropped, waiting for reads to complete...");
        if let Some(thread) = self.dispatch_thread.take()
            && thread.join().is_err()
        {
            log::error!("Failed to join file dispatch thread");
        }
        log::info!("All file reads completed, ThreadedFileSystem dropped.");
    }
}

/// 实际的读取任务 (运行在 Rayon 线程池中)
fn read_file_task(req: ReadRequest) -> FileCompletion {
    let _span = crate::profile_span!("read_file_task");
    log::debug!("Reading file: {:?} ({} bytes)", req.path, req.size);

    let result = std::fs::read(&req.path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => FileError::NotFound(req.path.clone()),
        _ => FileError::Read {
            path: req.path.clone(),
            source,
        },
    });

    FileCompletion {
        file: req.file,
        result,
    }
}
