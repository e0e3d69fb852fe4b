use uuid::Uuid;

use crate::{validate_string, Error, Time, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Default for Role {
    fn default() -> Role {
        Role::User
    }
}

/// A user as stored, including its password hash
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<String>,
    pub gender: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub cover_photo: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub created_at: Time,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    pub fn account(&self) -> Account {
        Account {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            birthday: self.birthday.clone(),
            gender: self.gender.clone(),
            bio: self.bio.clone(),
            avatar: self.avatar.clone(),
            cover_photo: self.cover_photo.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// The part of a user that gets copied onto posts, comments and notifications
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PublicProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}

/// A user as returned to clients
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Account {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<String>,
    pub gender: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub cover_photo: Option<String>,
    pub role: Role,
    pub created_at: Time,
}

impl Account {
    pub fn profile(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), Error> {
        for (field, value) in [
            ("email", &self.email),
            ("password", &self.password),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            validate_string(value)?;
            if value.trim().is_empty() {
                return Err(Error::validation(format!("{field} is required")));
            }
        }
        if !self.email.contains('@') {
            return Err(Error::validation("email is not valid"));
        }
        for s in self.birthday.iter().chain(self.gender.iter()) {
            validate_string(s)?;
        }
        Ok(())
    }
}

/// Account creation through the admin endpoint, which may pick the role
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewAccount {
    #[serde(flatten)]
    pub user: NewUser,
    #[serde(default)]
    pub role: Role,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewSession {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub device: String,
}

impl NewSession {
    pub fn validate(&self) -> Result<(), Error> {
        validate_string(&self.email)?;
        validate_string(&self.password)?;
        validate_string(&self.device)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub Uuid);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Session {
    pub token: AuthToken,
    pub user: Account,
}

/// Fields left to `None` are not modified
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub avatar: Option<String>,
    pub cover_photo: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        for s in [
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.bio,
            &self.gender,
            &self.avatar,
            &self.cover_photo,
        ]
        .into_iter()
        .flatten()
        {
            validate_string(s)?;
        }
        for (field, value) in [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(Error::validation(format!("{field} cannot be empty")));
            }
        }
        if matches!(&self.email, Some(e) if !e.contains('@')) {
            return Err(Error::validation("email is not valid"));
        }
        Ok(())
    }

    pub fn apply_to(self, user: &mut User) {
        macro_rules! set {
            ($field:ident) => {
                if let Some(v) = self.$field {
                    user.$field = v;
                }
            };
            (opt $field:ident) => {
                if let Some(v) = self.$field {
                    user.$field = Some(v);
                }
            };
        }
        set!(first_name);
        set!(last_name);
        set!(email);
        set!(opt bio);
        set!(opt gender);
        set!(opt avatar);
        set!(opt cover_photo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            email: String::from("ada@example.org"),
            password: String::from("hunter2"),
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            birthday: None,
            gender: None,
        }
    }

    #[test]
    fn new_user_validation() {
        assert_eq!(new_user().validate(), Ok(()));

        let mut u = new_user();
        u.first_name = String::from("  ");
        assert!(matches!(u.validate(), Err(Error::Validation(_))));

        let mut u = new_user();
        u.email = String::from("nope");
        assert!(matches!(u.validate(), Err(Error::Validation(_))));

        let mut u = new_user();
        u.password = String::from("a\0b");
        assert!(matches!(u.validate(), Err(Error::NullByteInString(_))));
    }

    #[test]
    fn profile_update_only_touches_given_fields() {
        let mut user = User {
            id: UserId::stub(),
            email: String::from("ada@example.org"),
            password_hash: String::new(),
            first_name: String::from("Ada"),
            last_name: String::from("Lovelace"),
            birthday: None,
            gender: None,
            bio: None,
            avatar: None,
            cover_photo: None,
            role: Role::User,
            created_at: chrono::Utc::now(),
        };
        ProfileUpdate {
            last_name: Some(String::from("King")),
            bio: Some(String::from("analyst")),
            ..Default::default()
        }
        .apply_to(&mut user);
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.last_name, "King");
        assert_eq!(user.bio.as_deref(), Some("analyst"));
        assert_eq!(user.full_name(), "Ada King");
    }
}
