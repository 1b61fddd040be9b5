//! 编辑器面：整篇文档视为不透明的可变字符串。

use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 宿主编辑器接口（偏移量均为 UTF-8 字节偏移）。
pub trait Editor: Send + Sync {
    fn get_value(&self) -> String;

    fn set_value(&self, text: &str);

    /// 用 `text` 替换当前选区，光标移到插入文本末尾。
    fn replace_selection(&self, text: &str);

    fn get_selection(&self) -> String;

    fn get_cursor(&self) -> usize;

    /// 设置光标（同时清空选区）。
    fn set_cursor(&self, offset: usize);
}

#[derive(Debug, Default)]
struct BufferState {
    text: String,
    selection: Range<usize>,
}

/// 内存中的编辑器实现。
#[derive(Debug, Default)]
pub struct TextBuffer {
    state: Mutex<BufferState>,
}

impl TextBuffer {
    /// 光标位于文末。
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.len();
        Self {
            state: Mutex::new(BufferState {
                text,
                selection: end..end,
            }),
        }
    }

    pub fn with_selection(text: impl Into<String>, selection: Range<usize>) -> Self {
        let buffer = Self::new(text);
        buffer.select(selection);
        buffer
    }

    /// 设置选区，越界或落在字符中间时向前收拢到合法边界。
    pub fn select(&self, selection: Range<usize>) {
        let mut state = self.lock();
        let start = clamp_to_boundary(&state.text, selection.start);
        let end = clamp_to_boundary(&state.text, selection.end.max(selection.start));
        state.selection = start..end;
    }

    pub fn selection_range(&self) -> Range<usize> {
        self.lock().selection.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn clamp_to_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

impl Editor for TextBuffer {
    fn get_value(&self) -> String {
        self.lock().text.clone()
    }

    fn set_value(&self, text: &str) {
        let mut state = self.lock();
        state.text = text.to_string();
        let start = clamp_to_boundary(&state.text, state.selection.start);
        let end = clamp_to_boundary(&state.text, state.selection.end);
        state.selection = start..end;
    }

    fn replace_selection(&self, text: &str) {
        let mut state = self.lock();
        let range = state.selection.clone();
        state.text.replace_range(range.clone(), text);
        let cursor = range.start + text.len();
        state.selection = cursor..cursor;
    }

    fn get_selection(&self) -> String {
        let state = self.lock();
        state.text[state.selection.clone()].to_string()
    }

    fn get_cursor(&self) -> usize {
        self.lock().selection.start
    }

    fn set_cursor(&self, offset: usize) {
        let mut state = self.lock();
        let offset = clamp_to_boundary(&state.text, offset);
        state.selection = offset..offset;
    }
}
