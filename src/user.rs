//! Code for creating the user table and fetching users from the database.

use std::{fmt::Display, sync::LazyLock};

use email_address::EmailAddress;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated, normalised email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Create and validate an email address.
    ///
    /// Surrounding whitespace is removed and the address is lower-cased so
    /// that the same mailbox cannot be registered twice with different casing.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidEmail] if `raw_email` is not a valid email address.
    pub fn new(raw_email: &str) -> Result<Self, Error> {
        let email = raw_email.trim().to_lowercase();

        if EmailAddress::is_valid(&email) {
            Ok(Self(email))
        } else {
            Err(Error::InvalidEmail(raw_email.to_owned()))
        }
    }

    /// Create a new `Email` without any validation.
    ///
    /// For emails coming from the user (e.g., via the REST API), this function should **not** be used, instead use the checked version.
    pub fn new_unchecked(raw_email: &str) -> Self {
        Self(raw_email.to_owned())
    }

    /// The email address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("username pattern is valid"));

/// A username of 3 to 20 letters, digits or underscores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// The minimum number of characters in a username.
    pub const MIN_LENGTH: usize = 3;
    /// The maximum number of characters in a username.
    pub const MAX_LENGTH: usize = 20;

    /// Create and validate a username.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidUsername] if `raw_username` is too short, too
    /// long or contains characters other than letters, digits and underscores.
    pub fn new(raw_username: &str) -> Result<Self, Error> {
        let length = raw_username.chars().count();

        if length < Self::MIN_LENGTH {
            return Err(Error::InvalidUsername(format!(
                "username must be at least {} characters long",
                Self::MIN_LENGTH
            )));
        }

        if length > Self::MAX_LENGTH {
            return Err(Error::InvalidUsername(format!(
                "username must be at most {} characters long",
                Self::MAX_LENGTH
            )));
        }

        if !USERNAME_PATTERN.is_match(raw_username) {
            return Err(Error::InvalidUsername(
                "username may only contain letters, numbers and underscores".to_owned(),
            ));
        }

        Ok(Self(raw_username.to_owned()))
    }

    /// Create a new `Username` without any validation.
    pub fn new_unchecked(raw_username: &str) -> Self {
        Self(raw_username.to_owned())
    }

    /// The username as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A user's display name of at most 100 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FullName(String);

impl FullName {
    /// The maximum number of characters in a full name.
    pub const MAX_LENGTH: usize = 100;

    /// Create and validate a full name.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidFullName] if `raw_name` is longer than [FullName::MAX_LENGTH].
    pub fn new(raw_name: &str) -> Result<Self, Error> {
        if raw_name.chars().count() > Self::MAX_LENGTH {
            return Err(Error::InvalidFullName(format!(
                "full name must be at most {} characters long",
                Self::MAX_LENGTH
            )));
        }

        Ok(Self(raw_name.trim().to_owned()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's email address.
    pub email: Email,
    /// The user's username, if they have one.
    pub username: Option<Username>,
    /// The user's full name, if they gave one.
    pub full_name: Option<FullName>,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// Embedded in every token issued to the user. Bumping it invalidates
    /// every access token issued before the bump.
    pub token_version: i64,
    /// When the user registered.
    pub created_at: OffsetDateTime,
    /// When the user was last modified.
    pub updated_at: OffsetDateTime,
    /// When the account was deactivated, if it has been.
    pub deleted_at: Option<OffsetDateTime>,
}

impl User {
    /// Whether the account has been deactivated.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn map_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let raw_email: String = row.get(1)?;
        let raw_username: Option<String> = row.get(2)?;
        let raw_password_hash: String = row.get(3)?;
        let raw_full_name: Option<String> = row.get(4)?;

        Ok(Self {
            id: UserID::new(row.get(0)?),
            email: Email::new_unchecked(&raw_email),
            username: raw_username.as_deref().map(Username::new_unchecked),
            password_hash: PasswordHash::new_unchecked(&raw_password_hash),
            full_name: raw_full_name.map(FullName),
            token_version: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            deleted_at: row.get(8)?,
        })
    }
}

/// The public view of a user, i.e., everything except the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The user's ID.
    pub id: UserID,
    /// The user's email address.
    pub email: Email,
    /// The user's username.
    pub username: Option<Username>,
    /// The user's full name.
    pub full_name: Option<FullName>,
    /// When the user registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the user was last modified.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// The data needed to create a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// The new user's email address.
    pub email: Email,
    /// The new user's username.
    pub username: Username,
    /// The new user's full name.
    pub full_name: Option<FullName>,
    /// The new user's password hash.
    pub password_hash: PasswordHash,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                username TEXT UNIQUE,
                password TEXT NOT NULL,
                full_name TEXT,
                token_version INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
                )",
        (),
    )?;

    Ok(())
}

const SELECT_USER: &str = "SELECT id, email, username, password, full_name, token_version, \
    created_at, updated_at, deleted_at FROM user";

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns:
/// - [Error::DuplicateEmail] or [Error::DuplicateUsername] if the email or
///   username belongs to another user.
/// - [Error::SqlError] if an SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO user (email, username, password, full_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        (
            new_user.email.as_str(),
            new_user.username.as_str(),
            new_user.password_hash.to_string(),
            new_user.full_name.as_ref().map(FullName::as_str),
            now,
        ),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    get_user_by_id(id, connection)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("{SELECT_USER} WHERE id = :id"))?
        .query_row(&[(":id", &user_id.as_i64())], User::map_row)
        .map_err(|error| error.into())
}

/// Get the user whose email or username equals `identifier`.
///
/// Emails are stored lower-cased, so `identifier` is also compared
/// lower-cased against the email column.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user matches, or [Error::SqlError] if an
/// SQL related error occurred.
pub fn get_user_by_email_or_username(
    identifier: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let identifier = identifier.trim();

    connection
        .prepare(&format!(
            "{SELECT_USER} WHERE email = :email OR username = :username"
        ))?
        .query_row(
            &[
                (":email", &identifier.to_lowercase()),
                (":username", &identifier.to_owned()),
            ],
            User::map_row,
        )
        .map_err(|error| error.into())
}

/// Whether `identifier` is already used as an email or username.
///
/// # Errors
///
/// Returns [Error::SqlError] if an SQL related error occurred.
pub fn is_identifier_taken(identifier: &str, connection: &Connection) -> Result<bool, Error> {
    match get_user_by_email_or_username(identifier, connection) {
        Ok(_) => Ok(true),
        Err(Error::NotFound) => Ok(false),
        Err(error) => Err(error),
    }
}

/// Replace the password hash of the user `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the ID `user_id`, or
/// [Error::SqlError] if an SQL related error occurred.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1, updated_at = ?2 WHERE id = ?3",
        (
            password_hash.to_string(),
            OffsetDateTime::now_utc(),
            user_id.as_i64(),
        ),
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// Increment the token version of the user `user_id` and return the new version.
///
/// Access tokens carry the version they were issued with, so this invalidates
/// every access token issued to the user so far.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has the ID `user_id`, or
/// [Error::SqlError] if an SQL related error occurred.
pub fn bump_token_version(user_id: UserID, connection: &Connection) -> Result<i64, Error> {
    connection
        .query_row(
            "UPDATE user SET token_version = token_version + 1 WHERE id = ?1
             RETURNING token_version",
            (user_id.as_i64(),),
            |row| row.get(0),
        )
        .optional()?
        .ok_or(Error::NotFound)
}

/// Mark the user `user_id` as deactivated.
///
/// The row is kept so that the user's data survives, but a deactivated user
/// cannot log in, refresh tokens or reset their password.
///
/// # Errors
///
/// Returns [Error::NotFound] if no active user has the ID `user_id`, or
/// [Error::SqlError] if an SQL related error occurred.
pub fn soft_delete_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let now = OffsetDateTime::now_utc();

    let rows_affected = connection.execute(
        "UPDATE user SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        (now, user_id.as_i64()),
    )?;

    match rows_affected {
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

/// One page of active users.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    /// The users on this page, ordered by ID.
    pub data: Vec<UserProfile>,
    /// The number of active users.
    pub total: u64,
    /// The 1-based page number.
    pub page: u64,
    /// The number of the last page.
    pub last_page: u64,
}

/// Get page `page` (1-based) of the active users, `limit` users per page.
///
/// A `page` or `limit` of zero is treated as one.
///
/// # Errors
///
/// Returns [Error::SqlError] if an SQL related error occurred.
pub fn list_users(page: u64, limit: u64, connection: &Connection) -> Result<UserPage, Error> {
    let page = page.max(1);
    let limit = limit.max(1);

    let total: u64 = connection.query_row(
        "SELECT COUNT(*) FROM user WHERE deleted_at IS NULL",
        (),
        |row| row.get(0),
    )?;

    let data = connection
        .prepare(&format!(
            "{SELECT_USER} WHERE deleted_at IS NULL ORDER BY id LIMIT ?1 OFFSET ?2"
        ))?
        .query_map(
            (limit, (page - 1).saturating_mul(limit)),
            User::map_row,
        )?
        .map(|user| user.map(|user| UserProfile::from(&user)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UserPage {
        data,
        total,
        page,
        last_page: total.div_ceil(limit),
    })
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error, PasswordHash,
        user::{
            Email, FullName, NewUser, UserID, Username, bump_token_version, create_user,
            create_user_table, get_user_by_email_or_username, get_user_by_id,
            is_identifier_taken, list_users, soft_delete_user, update_password,
        },
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: Email::new(email).unwrap(),
            username: Username::new(username).unwrap(),
            full_name: Some(FullName::new("Test User").unwrap()),
            password_hash: PasswordHash::new_unchecked("hunter2"),
        }
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();

        let inserted_user = create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.token_version, 1);
        assert_eq!(
            inserted_user.password_hash,
            PasswordHash::new_unchecked("hunter2")
        );
    }

    #[test]
    fn insert_user_fails_with_duplicate_email() {
        let db_connection = get_db_connection();
        create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();

        let result = create_user(new_user("foo@bar.baz", "bar"), &db_connection);

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn insert_user_fails_with_duplicate_username() {
        let db_connection = get_db_connection();
        create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();

        let result = create_user(new_user("bar@bar.baz", "foo"), &db_connection);

        assert_eq!(result, Err(Error::DuplicateUsername));
    }

    #[test]
    fn get_user_fails_with_non_existent_id() {
        let db_connection = get_db_connection();

        let id = UserID::new(42);

        assert_eq!(get_user_by_id(id, &db_connection), Err(Error::NotFound));
    }

    #[test]
    fn get_user_succeeds_with_existing_id() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn get_user_by_email_or_username_matches_either() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();

        let by_email = get_user_by_email_or_username("FOO@bar.baz", &db_connection).unwrap();
        let by_username = get_user_by_email_or_username("foo", &db_connection).unwrap();

        assert_eq!(by_email.id, test_user.id);
        assert_eq!(by_username.id, test_user.id);
        assert_eq!(
            get_user_by_email_or_username("nobody", &db_connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn is_identifier_taken_reports_existing_users() {
        let db_connection = get_db_connection();
        create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();

        assert!(is_identifier_taken("foo@bar.baz", &db_connection).unwrap());
        assert!(is_identifier_taken("foo", &db_connection).unwrap());
        assert!(!is_identifier_taken("bar", &db_connection).unwrap());
    }

    #[test]
    fn update_password_replaces_hash() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();
        let new_hash = PasswordHash::new_unchecked("hunter3");

        update_password(test_user.id, &new_hash, &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();
        assert_eq!(retrieved_user.password_hash, new_hash);
    }

    #[test]
    fn update_password_fails_for_missing_user() {
        let db_connection = get_db_connection();

        let result = update_password(
            UserID::new(42),
            &PasswordHash::new_unchecked("hunter3"),
            &db_connection,
        );

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn bump_token_version_increments() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();

        assert_eq!(bump_token_version(test_user.id, &db_connection), Ok(2));
        assert_eq!(bump_token_version(test_user.id, &db_connection), Ok(3));
        assert_eq!(
            bump_token_version(UserID::new(42), &db_connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn soft_delete_user_keeps_row_and_marks_it() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();

        soft_delete_user(test_user.id, &db_connection).unwrap();

        let retrieved_user = get_user_by_id(test_user.id, &db_connection).unwrap();
        assert!(retrieved_user.is_deleted());
        assert!(retrieved_user.updated_at >= test_user.updated_at);
    }

    #[test]
    fn soft_delete_user_fails_for_missing_or_deleted_user() {
        let db_connection = get_db_connection();
        let test_user = create_user(new_user("foo@bar.baz", "foo"), &db_connection).unwrap();
        soft_delete_user(test_user.id, &db_connection).unwrap();

        assert_eq!(
            soft_delete_user(test_user.id, &db_connection),
            Err(Error::NotFound)
        );
        assert_eq!(
            soft_delete_user(UserID::new(42), &db_connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn list_users_pages_through_active_users() {
        let db_connection = get_db_connection();
        let first = create_user(new_user("a@bar.baz", "aaa"), &db_connection).unwrap();
        let second = create_user(new_user("b@bar.baz", "bbb"), &db_connection).unwrap();
        let deleted = create_user(new_user("c@bar.baz", "ccc"), &db_connection).unwrap();
        let third = create_user(new_user("d@bar.baz", "ddd"), &db_connection).unwrap();
        soft_delete_user(deleted.id, &db_connection).unwrap();

        let page_one = list_users(1, 2, &db_connection).unwrap();
        let page_two = list_users(2, 2, &db_connection).unwrap();

        assert_eq!(page_one.total, 3);
        assert_eq!(page_one.last_page, 2);
        assert_eq!(
            page_one.data.iter().map(|user| user.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );
        assert_eq!(
            page_two.data.iter().map(|user| user.id).collect::<Vec<_>>(),
            vec![third.id]
        );
    }

    #[test]
    fn list_users_treats_zero_as_one() {
        let db_connection = get_db_connection();
        create_user(new_user("a@bar.baz", "aaa"), &db_connection).unwrap();

        let page = list_users(0, 0, &db_connection).unwrap();

        assert_eq!(page.page, 1);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.last_page, 1);
    }

    #[test]
    fn list_users_of_empty_table() {
        let db_connection = get_db_connection();

        let page = list_users(1, 10, &db_connection).unwrap();

        assert!(page.data.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.last_page, 0);
    }
}
