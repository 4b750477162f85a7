/// Maps byte offsets in an input to 1-based (line, column) pairs. Columns count characters, not
/// bytes.
#[derive(Debug, Clone)]
pub struct NewlineCache {
    /// The byte offset at which each line starts. Always contains at least `0`.
    line_starts: Vec<usize>,
    len: usize,
}

impl NewlineCache {
    pub fn new(src: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            src.char_indices()
                .filter(|&(_, c)| c == '\n')
                .map(|(off, _)| off + 1),
        );
        NewlineCache {
            line_starts,
            len: src.len(),
        }
    }

    /// Return the 1-based line number of `byte`, or `None` if `byte` exceeds the input.
    pub fn byte_to_line_num(&self, byte: usize) -> Option<usize> {
        if byte > self.len {
            return None;
        }
        match self.line_starts.binary_search(&byte) {
            Ok(i) => Some(i + 1),
            Err(i) => Some(i),
        }
    }

    /// Return the 1-based line and column of `byte` in `src`, which must be the string this cache
    /// was built from.
    pub fn byte_to_line_and_col(&self, src: &str, byte: usize) -> Option<(usize, usize)> {
        if src.len() != self.len || !src.is_char_boundary(byte.min(src.len())) {
            return None;
        }
        let line = self.byte_to_line_num(byte)?;
        let line_start = self.line_starts[line - 1];
        Some((line, src[line_start..byte].chars().count() + 1))
    }

    pub fn lines_len(&self) -> usize {
        self.line_starts.len()
    }
}
