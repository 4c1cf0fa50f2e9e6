use std::borrow::Borrow;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 图片在缓存中的唯一标识，即规范化后的绝对路径
///
/// 注意这里没有使用内容哈希，原地修改过的图片会一直沿用旧的特征
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// 从文件路径构造，相对路径基于当前工作目录
    ///
    /// 不会访问文件系统，因此已删除的文件同样可以得到它原本的标识。
    /// 路径不是合法的 UTF-8 时返回 `InvalidData`
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = normalize(&std::path::absolute(path.as_ref())?);
        match path.into_os_string().into_string() {
            Ok(s) => Ok(Self(s)),
            Err(s) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("路径不是合法的 UTF-8: {}", Path::new(&s).display()),
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// 文件名部分，用于进度显示
    pub fn file_name(&self) -> &str {
        self.as_path().file_name().and_then(|s| s.to_str()).unwrap_or(&self.0)
    }
}

// 按字面处理 `.` 和 `..`，不解析符号链接
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            c => out.push(c),
        }
    }
    out
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for Identity {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_normalizes_dots() {
        let id = Identity::from_path("/tmp/images/./sub/../a.jpg").unwrap();
        assert_eq!(id.as_str(), "/tmp/images/a.jpg");
        assert_eq!(id.file_name(), "a.jpg");
    }

    #[test]
    fn test_from_path_relative_is_absolute() {
        let id = Identity::from_path("a.jpg").unwrap();
        assert!(id.as_path().is_absolute());
        assert!(id.as_str().ends_with("a.jpg"));
    }

    #[test]
    fn test_same_file_same_identity() {
        let a = Identity::from_path("/tmp/x/../y/b.png").unwrap();
        let b = Identity::from_path("/tmp/y/b.png").unwrap();
        assert_eq!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn test_from_path_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("/tmp").join(OsStr::from_bytes(b"a\xff.jpg"));
        let err = Identity::from_path(path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
