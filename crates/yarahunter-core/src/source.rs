//! 证据回读：按 (offset, length) 重新打开文件读取命中字节
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// 重新打开文件，定位到 `offset` 后读取恰好 `length` 字节；不足则报错
pub(crate) fn read_range(path: &Path, offset: u64, length: usize) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; length];
    file.read_exact(&mut buf)?;
    Ok(buf)
}
