//! 共享控制台输出
//!
//! 所有Worker共用一个控制台。同一把锁既保护多行消息的整体写入，
//! 也保护子进程标准流的挂接（spawn）时刻。锁只在同步代码中持有，
//! 从不跨越await点。

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct Console {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Console {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// 写到进程标准输出的控制台
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// 写到内存缓冲区的控制台，返回可读取内容的句柄
    pub fn captured() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::new(Box::new(captured.clone())), captured)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 整块写入，期间其他Worker无法插入输出
    pub fn write_block(&self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let mut out = self.lock();
        out.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            out.write_all(b"\n")?;
        }
        out.flush()
    }

    /// 在控制台锁内执行子进程标准流的挂接
    pub fn with_attach_lock<T>(&self, attach: impl FnOnce() -> T) -> T {
        let _guard = self.lock();
        attach()
    }
}

/// 内存中的控制台输出
#[derive(Clone, Default)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn contents(&self) -> String {
        let buffer = self
            .buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
