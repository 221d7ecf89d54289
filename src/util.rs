use std::path::Path;

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

/// Render a command line the user can paste into a shell.
pub fn format_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut words: Vec<&str> = Vec::with_capacity(args.len() + 1);
    words.push(program);
    for arg in args {
        words.push(arg.as_ref());
    }
    shell_words::join(words)
}
