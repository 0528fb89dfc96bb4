use super::locations::Position;

/// Number of diagnostics after which parsing is abandoned.
pub const MAX_ERRORS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error(pub Position, pub String);

impl Error {
    pub fn new(pos: Position, msg: &str) -> Self {
        Self(pos, msg.to_string())
    }

    pub fn position(&self) -> &Position {
        &self.0
    }

    pub fn message(&self) -> &str {
        &self.1
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.filename.is_empty() && !self.0.is_valid() {
            return write!(f, "{}", self.1);
        }
        write!(f, "{}: {}", self.0, self.1)
    }
}

impl std::error::Error for Error {}

/// Diagnostics of one parse, in the order they were reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    pub fn add(&mut self, pos: Position, msg: &str) {
        self.0.push(Error::new(pos, msg));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Error> {
        self.0.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for ErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.len() {
            0 => write!(f, "no errors"),
            _ => {
                let lines: Vec<String> = self.0.iter().map(Error::to_string).collect();
                write!(f, "{}", lines.join("\n"))
            }
        }
    }
}

impl std::error::Error for ErrorList {}
