//! 模板编译与渲染用的字符串拼接工具。

#[derive(Debug, Default, Clone)]
pub(crate) struct StringBuilder {
    buf: String,
}

impl StringBuilder {
    pub(crate) fn new() -> Self {
        Self { buf: String::new() }
    }

    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            buf: String::with_capacity(n),
        }
    }

    pub(crate) fn write_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub(crate) fn write_char(&mut self, c: char) {
        self.buf.push(c);
    }

    /// 依次写入 `items`，中间用 `sep` 分隔。
    pub(crate) fn write_joined(&mut self, items: impl IntoIterator<Item = String>, sep: &str) {
        for (i, s) in items.into_iter().enumerate() {
            if i > 0 {
                self.buf.push_str(sep);
            }
            self.buf.push_str(&s);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 取走已写入的内容，自身清空。
    pub(crate) fn take(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }

    pub(crate) fn into_string(self) -> String {
        self.buf
    }
}
