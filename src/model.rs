use ::chrono::{DateTime, Datelike, Utc};

use crate::error::ForumError;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::sqlx::Type,
    ::serde::Serialize,
    ::serde::Deserialize,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub(crate) enum Role {
    Admin,
    LanguageTeacher,
    Teacher,
    Student,
    Parent,
}

impl Role {
    pub(crate) const ALL: [Role; 5] = [
        Role::Admin,
        Role::LanguageTeacher,
        Role::Teacher,
        Role::Student,
        Role::Parent,
    ];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::LanguageTeacher => "language_teacher",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }

    /// Roles allowed to author posts at all.
    pub(crate) fn can_post(&self) -> bool {
        match self {
            Role::Admin | Role::LanguageTeacher => true,
            Role::Teacher | Role::Student | Role::Parent => false,
        }
    }
}

impl ::std::str::FromStr for Role {
    type Err = ForumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| {
                ForumError::Validation(format!("invalid role: {}", value))
            })
    }
}

/// A concrete grade. Users belong to exactly one, winners are computed per
/// grade.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::sqlx::Type,
    ::serde::Serialize,
    ::serde::Deserialize,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub(crate) enum GradeLevel {
    Junior,
    Middle,
    Senior,
}

impl GradeLevel {
    pub(crate) const ALL: [GradeLevel; 3] =
        [GradeLevel::Junior, GradeLevel::Middle, GradeLevel::Senior];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            GradeLevel::Junior => "junior",
            GradeLevel::Middle => "middle",
            GradeLevel::Senior => "senior",
        }
    }
}

impl ::std::str::FromStr for GradeLevel {
    type Err = ForumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        GradeLevel::ALL
            .into_iter()
            .find(|grade| grade.as_str() == value)
            .ok_or_else(|| {
                ForumError::Validation(format!("invalid grade level: {}", value))
            })
    }
}

impl ::std::fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a post is addressed to: one grade, or everybody.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::sqlx::Type,
    ::serde::Serialize,
    ::serde::Deserialize,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub(crate) enum Audience {
    Junior,
    Middle,
    Senior,
    All,
}

impl Audience {
    pub(crate) const ALL: [Audience; 4] = [
        Audience::Junior,
        Audience::Middle,
        Audience::Senior,
        Audience::All,
    ];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Audience::Junior => "junior",
            Audience::Middle => "middle",
            Audience::Senior => "senior",
            Audience::All => "all",
        }
    }

    pub(crate) fn grade(&self) -> Option<GradeLevel> {
        match self {
            Audience::Junior => Some(GradeLevel::Junior),
            Audience::Middle => Some(GradeLevel::Middle),
            Audience::Senior => Some(GradeLevel::Senior),
            Audience::All => None,
        }
    }
}

impl From<GradeLevel> for Audience {
    fn from(grade: GradeLevel) -> Self {
        match grade {
            GradeLevel::Junior => Audience::Junior,
            GradeLevel::Middle => Audience::Middle,
            GradeLevel::Senior => Audience::Senior,
        }
    }
}

impl ::std::str::FromStr for Audience {
    type Err = ForumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Audience::ALL
            .into_iter()
            .find(|audience| audience.as_str() == value)
            .ok_or_else(|| {
                ForumError::Validation(format!("invalid grade level: {}", value))
            })
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    ::sqlx::Type,
    ::serde::Serialize,
    ::serde::Deserialize,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub(crate) enum PostType {
    Article,
    Announcement,
    Reminder,
    PrincipalNote,
}

impl PostType {
    pub(crate) const ALL: [PostType; 4] = [
        PostType::Article,
        PostType::Announcement,
        PostType::Reminder,
        PostType::PrincipalNote,
    ];

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            PostType::Article => "article",
            PostType::Announcement => "announcement",
            PostType::Reminder => "reminder",
            PostType::PrincipalNote => "principal_note",
        }
    }

    /// Checked at type selection independently of `Role::can_post`.
    pub(crate) fn may_be_authored_by(&self, role: Role) -> bool {
        match self {
            PostType::PrincipalNote => match role {
                Role::Admin | Role::LanguageTeacher => true,
                Role::Teacher | Role::Student | Role::Parent => false,
            },
            PostType::Article | PostType::Announcement | PostType::Reminder => {
                true
            }
        }
    }
}

impl ::std::str::FromStr for PostType {
    type Err = ForumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PostType::ALL
            .into_iter()
            .find(|post_type| post_type.as_str() == value)
            .ok_or_else(|| {
                ForumError::Validation(format!("invalid post type: {}", value))
            })
    }
}

/// Calendar month in UTC, rendered as `YYYY-MM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct VoteMonth {
    year: i32,
    month: u32,
}

impl VoteMonth {
    pub(crate) fn new(year: i32, month: u32) -> Result<VoteMonth, ForumError> {
        if !(0..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(ForumError::Validation(format!(
                "invalid month: {}-{}",
                year, month
            )));
        }

        Ok(VoteMonth { year, month })
    }

    pub(crate) fn containing(at: &DateTime<Utc>) -> VoteMonth {
        VoteMonth {
            year: at.year(),
            month: at.month(),
        }
    }

    pub(crate) fn current() -> VoteMonth {
        VoteMonth::containing(&Utc::now())
    }
}

fn month_pattern() -> &'static ::regex::Regex {
    static PATTERN: ::std::sync::OnceLock<::regex::Regex> =
        ::std::sync::OnceLock::new();

    PATTERN.get_or_init(|| {
        ::regex::Regex::new(r"^(\d{4})-(\d{2})$").expect("valid month regex")
    })
}

impl ::std::str::FromStr for VoteMonth {
    type Err = ForumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ForumError::Validation(format!(
                "invalid month format, expected YYYY-MM: {}",
                value
            ))
        };

        let captures = month_pattern().captures(value).ok_or_else(invalid)?;
        let year = captures[1].parse::<i32>().map_err(|_| invalid())?;
        let month = captures[2].parse::<u32>().map_err(|_| invalid())?;

        VoteMonth::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for VoteMonth {
    type Error = ForumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl ::std::fmt::Display for VoteMonth {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl ::serde::Serialize for VoteMonth {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ::serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> ::serde::Deserialize<'de> for VoteMonth {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: ::serde::Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        string.parse().map_err(::serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub grade_level: GradeLevel,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl User {
    pub(crate) fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub(crate) fn can_post(&self) -> bool {
        self.is_active && self.role.can_post()
    }

    pub(crate) fn can_moderate(&self) -> bool {
        self.is_active && self.is_admin()
    }

    pub(crate) fn can_vote(&self) -> bool {
        self.is_active
    }

    pub(crate) fn accessible_grades(&self) -> ::std::vec::Vec<GradeLevel> {
        if self.is_admin() {
            GradeLevel::ALL.to_vec()
        } else {
            vec![self.grade_level]
        }
    }

    pub(crate) fn can_access_grade(&self, grade: GradeLevel) -> bool {
        self.is_admin() || self.grade_level == grade
    }
}

#[derive(Clone, Debug)]
pub(crate) struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub grade_level: GradeLevel,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub grade_level: Audience,
    pub author_id: i64,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_published: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Post {
    pub(crate) fn can_be_voted_on(&self) -> bool {
        self.post_type == PostType::Article && self.is_published
    }

    pub(crate) fn is_expired(&self, now: &DateTime<Utc>) -> bool {
        match &self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }

    pub(crate) fn is_accessible_by(&self, user: &User) -> bool {
        is_accessible(self, user)
    }
}

/// Validated fields of a post about to be stored.
#[derive(Clone, Debug)]
pub(crate) struct PostDraft {
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub grade_level: Audience,
    pub is_published: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct Vote {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub vote_month: VoteMonth,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct MonthlyWinner {
    pub id: i64,
    pub post_id: i64,
    pub post_title: String,
    pub post_author: String,
    pub month: VoteMonth,
    pub grade_level: GradeLevel,
    pub vote_count: u64,
    pub created_at: DateTime<Utc>,
}

/// Vote tally of one article within one month.
#[derive(Clone, Debug, PartialEq, ::serde::Serialize)]
pub(crate) struct PostVoteCount {
    pub post_id: i64,
    pub title: String,
    pub grade_level: Audience,
    pub vote_count: u64,
}

pub(crate) fn is_accessible(post: &Post, user: &User) -> bool {
    match user.role {
        Role::Admin => true,
        Role::LanguageTeacher | Role::Teacher | Role::Student | Role::Parent => {
            match post.grade_level.grade() {
                None => true,
                Some(grade) => grade == user.grade_level,
            }
        }
    }
}

pub(crate) fn accessible_grades(user: &User) -> ::std::vec::Vec<GradeLevel> {
    user.accessible_grades()
}

/// Grades a query on behalf of `user` may cover. A requested grade narrows
/// the scope to that grade and fails with `Access` when the user cannot see
/// it.
pub(crate) fn grade_scope(
    user: &User,
    requested: Option<GradeLevel>,
) -> Result<::std::vec::Vec<GradeLevel>, ForumError> {
    match requested {
        Some(grade) if user.can_access_grade(grade) => Ok(vec![grade]),
        Some(grade) => Err(ForumError::Access(format!(
            "access denied to grade level {}",
            grade
        ))),
        None => Ok(accessible_grades(user)),
    }
}
