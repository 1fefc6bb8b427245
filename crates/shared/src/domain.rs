use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend controller a list view talks to, e.g. `GET /api/Course`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resource {
    Course,
    CourseCategory,
    Lesson,
    Problem,
    Badge,
    Topic,
    Compiler,
    Coder,
    Blog,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Resource::Course,
        Resource::CourseCategory,
        Resource::Lesson,
        Resource::Problem,
        Resource::Badge,
        Resource::Topic,
        Resource::Compiler,
        Resource::Coder,
        Resource::Blog,
    ];

    pub fn controller_name(self) -> &'static str {
        match self {
            Resource::Course => "Course",
            Resource::CourseCategory => "CourseCategory",
            Resource::Lesson => "Lesson",
            Resource::Problem => "Problem",
            Resource::Badge => "Badge",
            Resource::Topic => "Topic",
            Resource::Compiler => "Compiler",
            Resource::Coder => "Coder",
            Resource::Blog => "Blog",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.controller_name())
    }
}

#[derive(Debug, Error)]
#[error("unknown resource '{0}'")]
pub struct ParseResourceError(pub String);

impl FromStr for Resource {
    type Err = ParseResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], "");
        Resource::ALL
            .into_iter()
            .find(|resource| resource.controller_name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ParseResourceError(s.to_string()))
    }
}

/// Record identifier as it appears in `/{Controller}/{id}` paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Page sizes offered by the admin tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum PageSize {
    Five,
    #[default]
    Ten,
    Twenty,
    Fifty,
    Hundred,
}

impl PageSize {
    pub const ALL: [PageSize; 5] = [
        PageSize::Five,
        PageSize::Ten,
        PageSize::Twenty,
        PageSize::Fifty,
        PageSize::Hundred,
    ];

    pub fn get(self) -> u32 {
        match self {
            PageSize::Five => 5,
            PageSize::Ten => 10,
            PageSize::Twenty => 20,
            PageSize::Fifty => 50,
            PageSize::Hundred => 100,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported page size {0}; expected one of 5, 10, 20, 50, 100")]
pub struct ParsePageSizeError(pub u32);

impl TryFrom<u32> for PageSize {
    type Error = ParsePageSizeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        PageSize::ALL
            .into_iter()
            .find(|size| size.get() == value)
            .ok_or(ParsePageSizeError(value))
    }
}

impl From<PageSize> for u32 {
    fn from(value: PageSize) -> Self {
        value.get()
    }
}

impl Serialize for PageSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.get())
    }
}

impl<'de> Deserialize<'de> for PageSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u32::deserialize(deserializer)?;
        PageSize::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
