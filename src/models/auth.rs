//! Login and menu models

use serde::{Deserialize, Serialize};

/// Login form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Active employee with its first role membership
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoginAccount {
    pub employee_code: String,
    pub employee_name: String,
    pub password_hash: Option<String>,
    pub role_id: Option<i32>,
    pub is_admin_role: Option<bool>,
}

/// Login page model
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPage {
    pub title: &'static str,
    pub error_message: Option<String>,
}

/// One menu entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub module_id: i32,
    pub module_name: String,
    pub function_id: i32,
    pub function_name: String,
    pub url: String,
}

/// Menu entries of one module, in query order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuGroup {
    pub module_name: String,
    pub items: Vec<MenuItem>,
}

/// Group consecutive items by module; items must already be sorted by module
pub fn group_menu(items: Vec<MenuItem>) -> Vec<MenuGroup> {
    let mut groups: Vec<MenuGroup> = Vec::new();
    for item in items {
        let same_module = groups
            .last()
            .and_then(|g| g.items.first())
            .is_some_and(|first| first.module_id == item.module_id);

        if same_module {
            if let Some(group) = groups.last_mut() {
                group.items.push(item);
            }
        } else {
            groups.push(MenuGroup {
                module_name: item.module_name.clone(),
                items: vec![item],
            });
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(module_id: i32, module: &str, function_id: i32) -> MenuItem {
        MenuItem {
            module_id,
            module_name: module.to_string(),
            function_id,
            function_name: format!("F{}", function_id),
            url: format!("/f/{}", function_id),
        }
    }

    #[test]
    fn test_group_menu() {
        let groups = group_menu(vec![
            item(1, "Sales", 1),
            item(1, "Sales", 2),
            item(3, "Purchasing", 71),
            item(1, "Sales", 5),
        ]);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].module_name, "Sales");
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[1].items[0].function_id, 71);
        assert!(group_menu(Vec::new()).is_empty());
    }

    #[test]
    fn test_login_form_defaults() {
        let form: LoginForm = serde_json::from_str(r#"{"username":" emp01 "}"#).unwrap();
        assert_eq!(form.username, " emp01 ");
        assert!(form.password.is_empty());
    }
}
