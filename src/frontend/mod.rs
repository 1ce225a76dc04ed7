use std::path::PathBuf;

pub mod cursor;
pub mod lexer;

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

impl SourceFile {
    pub fn read(path: PathBuf) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(&path)?;

        Ok(Self {
            contents,
            origin: SourceFileOrigin::File(path),
        })
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}
