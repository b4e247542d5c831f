/// 文件名拆分结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileInfo {
    /// 带扩展名的文件名
    pub name: String,
    /// 文件所在目录，统一使用 `/` 连接
    pub path: String,
}

/// 将完整路径拆分为文件名和目录
///
/// 同时接受 `/` 与 `\` 作为分隔符。没有分隔符时 `path` 为空字符串。
pub fn split_path(full_path: &str) -> FileInfo {
    let mut segments: Vec<&str> = full_path.split(['/', '\\']).collect();
    // split 至少产生一个片段
    let name = segments.pop().unwrap_or_default().to_string();

    FileInfo {
        name,
        path: segments.join("/"),
    }
}

/// 按大小写策略规范化字符串（去除首尾空白，不区分大小写时转为小写）
pub fn normalize(input: &str, case_sensitive: bool) -> String {
    let trimmed = input.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// 隐藏文件过滤
///
/// 注意返回值的含义：`true` 表示文件可以参与匹配。
/// 以 `.` 开头且未允许隐藏文件时返回 `false`，其余情况返回 `true`。
pub fn check_hidden(filename: &str, include_hidden: bool) -> bool {
    !(filename.starts_with('.') && !include_hidden)
}

/// 判断文件名是否包含搜索关键字并通过隐藏文件过滤
pub fn matches(name: &str, search_key: &str, case_sensitive: bool, include_hidden: bool) -> bool {
    let name = normalize(name, case_sensitive);
    name.contains(search_key) && check_hidden(&name, include_hidden)
}

/// 绑定了关键字和匹配策略的文件名匹配器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatcher {
    search_key: String,
    case_sensitive: bool,
    include_hidden: bool,
}

impl NameMatcher {
    /// 创建匹配器，关键字按同一大小写策略规范化
    pub fn new(needle: &str, case_sensitive: bool, include_hidden: bool) -> Self {
        Self {
            search_key: normalize(needle, case_sensitive),
            case_sensitive,
            include_hidden,
        }
    }

    pub fn search_key(&self) -> &str {
        &self.search_key
    }

    pub fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    /// 检查文件名（不含目录）是否命中
    pub fn is_match(&self, name: &str) -> bool {
        matches(name, &self.search_key, self.case_sensitive, self.include_hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_path() {
        let info = split_path("/sdcard/DCIM/100MZLLA/1.jpg");
        assert_eq!(info.name, "1.jpg");
        assert_eq!(info.path, "/sdcard/DCIM/100MZLLA");
    }

    #[test]
    fn test_split_bare_name() {
        let info = split_path("1.jpg");
        assert_eq!(info.name, "1.jpg");
        assert_eq!(info.path, "");
    }

    #[test]
    fn test_split_backslash_path() {
        let info = split_path(r"sdcard\Music\song.mp3");
        assert_eq!(info.name, "song.mp3");
        assert_eq!(info.path, "sdcard/Music");
    }

    #[test]
    fn test_check_hidden_polarity() {
        assert!(!check_hidden(".1.jpg", false));
        assert!(check_hidden(".1.jpg", true));
        assert!(check_hidden("1.jpg", false));
        assert!(check_hidden("1.jpg", true));
    }

    #[test]
    fn test_hidden_files() {
        assert!(!matches(".1.jpg", "1", false, false));
        assert!(matches("1.jpg", "1", false, false));
        assert!(matches(".1.jpg", "1", false, true));
    }

    #[test]
    fn test_case_sensitivity() {
        assert!(!matches("FB.jpg", "fb", true, true));
        assert!(matches("FB.jpg", "fb", false, true));
    }

    #[test]
    fn test_match_at_start() {
        assert!(matches("abc.png", "a", false, false));
        assert!(!matches("xyz.png", "a", false, false));
    }

    #[test]
    fn test_name_matcher_normalizes_key() {
        let matcher = NameMatcher::new("  Photo ", false, false);
        assert_eq!(matcher.search_key(), "photo");
        assert!(matcher.is_match("MyPHOTO.jpg"));
        assert!(!matcher.is_match(".photo.jpg"));

        let strict = NameMatcher::new("Photo", true, false);
        assert_eq!(strict.search_key(), "Photo");
        assert!(!strict.is_match("photo.jpg"));
    }
}
