use std::fmt::Write;

/// A named input for one benchmark run.
#[derive(Debug, Clone)]
pub struct Fixture {
    name: &'static str,
    group: FixtureSize,
    content: String,
}

impl Fixture {
    pub fn new<S: Into<String>>(name: &'static str, group: FixtureSize, content: S) -> Self {
        Self { name, group, content: content.into() }
    }

    pub fn small<S: Into<String>>(name: &'static str, content: S) -> Self {
        Self::new(name, FixtureSize::Small, content)
    }

    pub fn large<S: Into<String>>(name: &'static str, content: S) -> Self {
        Self::new(name, FixtureSize::Large, content)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> FixtureSize {
        self.group
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum FixtureSize {
    Small,
    Large,
}

/// Generates an event stream of `count` named events, each carrying an id
/// and `data_len` bytes of data.
pub fn generate_events(count: usize, data_len: usize) -> String {
    let data = "x".repeat(data_len);
    let mut stream = String::with_capacity(count * (data_len + 40));
    for id in 0..count {
        let _ = write!(stream, "event: tick\nid: {id}\ndata: {data}\n\n");
    }
    stream
}
