//! HTML forms
//!
//! Every form is a statically declared struct deserialized from an
//! `application/x-www-form-urlencoded` body and checked with `validator`.
//! Failures are collected into [`FormErrors`], a field name to messages
//! map that templates read as `errors.<field>`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{
    BlogWithMeta, CreateBlogInput, CreateCategoryInput, Profile, UpdateAccountInput,
    UpdateBlogInput, UpdateProfileInput, User,
};
use crate::services::comment::MAX_COMMENT_LENGTH;
use crate::services::password::check_password_policy;

/// Key used for errors that belong to the form as a whole
pub const NON_FIELD_ERRORS: &str = "non_field";

/// Field name to messages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::new();
        for (field, errs) in errors.field_errors() {
            let field = if field == "__all__" { NON_FIELD_ERRORS } else { field };
            for err in errs {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                out.add(field, message);
            }
        }
        out
    }
}

/// Run the derived validations and convert the result
fn check(form: &impl Validate) -> FormErrors {
    match form.validate() {
        Ok(()) => FormErrors::new(),
        Err(errors) => errors.into(),
    }
}

// ============================================================================
// Field validators
// ============================================================================

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("required"))
    } else {
        Ok(())
    }
}

fn error_with_message(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Required; letters, digits and `@ . + - _` only
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(error_with_message("required", "This field is required."));
    }
    if username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        Ok(())
    } else {
        Err(error_with_message(
            "invalid_username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ))
    }
}

/// Required, at most 1000 characters once surrounding whitespace is dropped
fn validate_comment_text(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(error_with_message("required", "This field is required."));
    }
    if value.chars().count() > MAX_COMMENT_LENGTH {
        return Err(error_with_message(
            "max_length",
            "Ensure this value has at most 1000 characters.",
        ));
    }
    Ok(())
}

fn optional_url(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || validator::validate_url(value) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_url"))
    }
}

fn optional_date(value: &str) -> Result<(), ValidationError> {
    parse_optional_date(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_date"))
}

/// Image reference: a URL or a relative path, no traversal
fn optional_image_ref(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || validator::validate_url(value) {
        return Ok(());
    }
    if value.split('/').any(|part| part == "..") || value.contains(char::is_whitespace) {
        return Err(ValidationError::new("invalid_image"));
    }
    Ok(())
}

fn optional_id(value: &str) -> Result<(), ValidationError> {
    parse_optional_id(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("invalid_choice"))
}

fn parse_optional_date(value: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map(Some)
}

fn parse_optional_id(value: &str) -> Result<Option<i64>, std::num::ParseIntError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some)
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
#[validate(schema(
    function = "passwords_match",
    skip_on_field_errors = false,
    message = "The two password fields didn't match."
))]
pub struct RegisterForm {
    #[validate(
        length(max = 150, message = "Ensure this value has at most 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[serde(skip_serializing)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password1: String,
    #[serde(skip_serializing)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password2: String,
}

fn passwords_match(form: &RegisterForm) -> Result<(), ValidationError> {
    if form.password1 != form.password2 {
        Err(ValidationError::new("password_mismatch"))
    } else {
        Ok(())
    }
}

impl RegisterForm {
    /// Field checks plus the password policy, reported on `password2`
    pub fn errors(&self) -> FormErrors {
        let mut errors = check(self);
        if !self.password1.is_empty() && self.password1 == self.password2 {
            for problem in check_password_policy(&self.password1, &self.username) {
                errors.add("password2", problem);
            }
        }
        errors
    }

    pub fn username(&self) -> &str {
        self.username.trim()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,
    #[serde(skip_serializing)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
    /// Where to go after logging in
    pub next: Option<String>,
}

impl LoginForm {
    pub fn errors(&self) -> FormErrors {
        check(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct UserUpdateForm {
    #[validate(
        length(max = 150, message = "Ensure this value has at most 150 characters."),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,
}

impl UserUpdateForm {
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }

    pub fn errors(&self) -> FormErrors {
        check(self)
    }

    pub fn to_input(&self) -> UpdateAccountInput {
        UpdateAccountInput {
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct ProfileForm {
    #[validate(length(max = 500, message = "Ensure this value has at most 500 characters."))]
    pub bio: String,
    #[validate(length(max = 500, message = "Ensure this value has at most 500 characters."))]
    pub location: String,
    /// `YYYY-MM-DD`, may be empty
    #[validate(custom(function = "optional_date", message = "Enter a valid date."))]
    pub birth_date: String,
    #[validate(
        length(max = 255, message = "Ensure this value has at most 255 characters."),
        custom(function = "optional_image_ref", message = "Enter a valid image URL or path.")
    )]
    pub avatar: String,
    #[validate(
        length(max = 200, message = "Ensure this value has at most 200 characters."),
        custom(function = "optional_url", message = "Enter a valid URL.")
    )]
    pub website: String,
}

impl ProfileForm {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            bio: profile.bio.clone(),
            location: profile.location.clone(),
            birth_date: profile
                .birth_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            avatar: profile.avatar.clone().unwrap_or_default(),
            website: profile.website.clone(),
        }
    }

    pub fn errors(&self) -> FormErrors {
        check(self)
    }

    /// Convert a validated form into service input
    pub fn to_input(&self) -> UpdateProfileInput {
        UpdateProfileInput {
            bio: self.bio.clone(),
            location: self.location.clone(),
            birth_date: parse_optional_date(&self.birth_date).ok().flatten(),
            avatar: Some(self.avatar.trim().to_string()).filter(|a| !a.is_empty()),
            website: self.website.clone(),
        }
    }
}

/// The profile page posts both forms in one body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePageForm {
    #[serde(flatten)]
    pub account: UserUpdateForm,
    #[serde(flatten)]
    pub profile: ProfileForm,
}

// ============================================================================
// Blogs, comments and categories
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct BlogForm {
    #[validate(
        length(max = 200, message = "Ensure this value has at most 200 characters."),
        custom(function = "not_blank", message = "This field is required.")
    )]
    pub title: String,
    #[validate(custom(function = "not_blank", message = "This field is required."))]
    pub content: String,
    /// Category id, empty for none
    #[validate(custom(function = "optional_id", message = "Select a valid choice."))]
    pub category: String,
    /// Checkbox: present when ticked
    pub is_published: Option<String>,
}

impl BlogForm {
    /// Blank form for the create page; new posts default to published
    pub fn new_post() -> Self {
        Self {
            is_published: Some("on".to_string()),
            ..Default::default()
        }
    }

    /// Pre-filled form for editing an existing post
    pub fn from_blog(blog: &BlogWithMeta) -> Self {
        Self {
            title: blog.blog.title.clone(),
            content: blog.blog.content.clone(),
            category: blog.blog.category_id.map(|id| id.to_string()).unwrap_or_default(),
            is_published: blog.blog.is_published.then(|| "on".to_string()),
        }
    }

    pub fn errors(&self) -> FormErrors {
        check(self)
    }

    pub fn category_id(&self) -> Option<i64> {
        parse_optional_id(&self.category).ok().flatten()
    }

    pub fn published(&self) -> bool {
        self.is_published.is_some()
    }

    pub fn to_create_input(&self) -> CreateBlogInput {
        CreateBlogInput {
            title: self.title.clone(),
            content: self.content.clone(),
            category_id: self.category_id(),
            is_published: self.published(),
        }
    }

    pub fn to_update_input(&self) -> UpdateBlogInput {
        UpdateBlogInput {
            title: self.title.clone(),
            content: self.content.clone(),
            category_id: self.category_id(),
            is_published: self.published(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct CommentForm {
    #[validate(custom(function = "validate_comment_text"))]
    pub content: String,
    /// Comment being replied to, empty for a root comment
    #[validate(custom(function = "optional_id", message = "Select a valid choice."))]
    pub parent_id: String,
}

impl CommentForm {
    pub fn errors(&self) -> FormErrors {
        check(self)
    }

    pub fn parent(&self) -> Option<i64> {
        parse_optional_id(&self.parent_id).ok().flatten()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct CategoryForm {
    #[validate(
        length(max = 100, message = "Ensure this value has at most 100 characters."),
        custom(function = "not_blank", message = "This field is required.")
    )]
    pub name: String,
    pub description: String,
}

impl CategoryForm {
    pub fn errors(&self) -> FormErrors {
        check(self)
    }

    pub fn to_input(&self) -> CreateCategoryInput {
        CreateCategoryInput {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, p1: &str, p2: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            email: "ada@example.com".to_string(),
            password1: p1.to_string(),
            password2: p2.to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(register("ada.l+blog", "tangerine-kettle", "tangerine-kettle")
            .errors()
            .is_empty());
    }

    #[test]
    fn test_password_mismatch_is_non_field_error() {
        let errors = register("ada", "tangerine-kettle", "tangerine-kettlE").errors();
        assert_eq!(
            errors.get(NON_FIELD_ERRORS),
            Some(&["The two password fields didn't match.".to_string()][..])
        );
    }

    #[test]
    fn test_password_policy_reported_on_second_field() {
        let errors = register("ada", "12345678", "12345678").errors();
        let messages = errors.get("password2").expect("policy errors");
        assert!(messages.iter().any(|m| m.contains("numeric")));
        assert!(messages.iter().any(|m| m.contains("common")));
    }

    #[test]
    fn test_username_characters() {
        assert!(register("bad name", "tangerine-kettle", "tangerine-kettle")
            .errors()
            .get("username")
            .is_some());
        assert!(register(&"a".repeat(151), "tangerine-kettle", "tangerine-kettle")
            .errors()
            .get("username")
            .is_some());
        assert!(validate_username("user@host.org").is_ok());
        assert!(validate_username("<script>").is_err());
    }

    #[test]
    fn test_invalid_email() {
        let mut form = register("ada", "tangerine-kettle", "tangerine-kettle");
        form.email = "not-an-email".to_string();
        assert_eq!(
            form.errors().get("email"),
            Some(&["Enter a valid email address.".to_string()][..])
        );
    }

    #[test]
    fn test_passwords_never_serialized() {
        let json = serde_json::to_string(&register("ada", "secret-one", "secret-one")).unwrap();
        assert!(!json.contains("secret-one"));
    }

    #[test]
    fn test_profile_form_optional_fields() {
        let empty = ProfileForm::default();
        assert!(empty.errors().is_empty());
        let input = empty.to_input();
        assert_eq!(input.birth_date, None);
        assert_eq!(input.avatar, None);

        let form = ProfileForm {
            birth_date: "1815-12-10".to_string(),
            website: "https://example.com/ada".to_string(),
            avatar: "avatars/ada.png".to_string(),
            ..Default::default()
        };
        assert!(form.errors().is_empty());
        assert_eq!(form.to_input().birth_date, NaiveDate::from_ymd_opt(1815, 12, 10));
        assert_eq!(form.to_input().avatar.as_deref(), Some("avatars/ada.png"));
    }

    #[test]
    fn test_profile_form_rejects_bad_values() {
        let form = ProfileForm {
            birth_date: "10/12/1815".to_string(),
            website: "not a url".to_string(),
            avatar: "../../etc/passwd".to_string(),
            bio: "x".repeat(501),
            ..Default::default()
        };
        let errors = form.errors();
        for field in ["birth_date", "website", "avatar", "bio"] {
            assert!(errors.get(field).is_some(), "expected error on {}", field);
        }
    }

    #[test]
    fn test_blog_form() {
        let form = BlogForm {
            title: "Hello".to_string(),
            content: "Body".to_string(),
            category: "3".to_string(),
            is_published: None,
        };
        assert!(form.errors().is_empty());
        let input = form.to_create_input();
        assert_eq!(input.category_id, Some(3));
        assert!(!input.is_published);

        let blank = BlogForm {
            title: "   ".to_string(),
            category: "abc".to_string(),
            ..BlogForm::new_post()
        };
        let errors = blank.errors();
        assert!(errors.get("title").is_some());
        assert!(errors.get("content").is_some());
        assert!(errors.get("category").is_some());
        assert!(BlogForm::new_post().published());
    }

    #[test]
    fn test_comment_form() {
        let reply = CommentForm {
            content: "Nice".to_string(),
            parent_id: "12".to_string(),
        };
        assert!(reply.errors().is_empty());
        assert_eq!(reply.parent(), Some(12));

        let too_long = CommentForm {
            content: "x".repeat(1001),
            parent_id: String::new(),
        };
        assert!(too_long.errors().get("content").is_some());
        assert_eq!(too_long.parent(), None);
    }

    #[test]
    fn test_comment_length_ignores_surrounding_whitespace() {
        let padded = CommentForm {
            content: format!("  {}\n\n", "x".repeat(1000)),
            parent_id: String::new(),
        };
        assert!(padded.errors().is_empty());

        let blank = CommentForm {
            content: " \n ".to_string(),
            parent_id: String::new(),
        };
        assert_eq!(
            blank.errors().get("content"),
            Some(&["This field is required.".to_string()][..])
        );
    }
}
