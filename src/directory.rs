//! LDAP directory resolver: display name plus raw group memberships for a
//! single principal. A fresh connection is opened per call and released on
//! every exit path; nothing is pooled or shared across requests.

use anyhow::Result;
use ldap3::{ldap_escape, Ldap, LdapConnAsync, Scope, SearchEntry};

use crate::config::Config;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryAttrs {
    /// Given name of the principal; empty when the directory has no entry.
    pub display_name: String,
    /// Group common names in directory response order, duplicates kept.
    pub groups: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    url: String,
    base_dn: String,
}

impl DirectoryResolver {
    pub fn new(cfg: &Config) -> Self {
        Self {
            url: cfg.ldap_url.clone(),
            base_dn: cfg.base_dn.clone(),
        }
    }

    /// Open a connection, run both searches, unbind. The searches live in a
    /// helper so the unbind runs unconditionally, error paths included.
    pub async fn resolve(&self, principal: &str) -> Result<DirectoryAttrs> {
        let (conn, mut ldap) = LdapConnAsync::new(&self.url).await?;
        ldap3::drive!(conn);
        let out = self.search(&mut ldap, principal).await;
        let _ = ldap.unbind().await;
        out
    }

    async fn search(&self, ldap: &mut Ldap, principal: &str) -> Result<DirectoryAttrs> {
        let uid = ldap_escape(principal);

        // Their given name. Zero matches is not an error (empty name); on
        // multiple matches the first entry wins.
        let (entries, _res) = ldap
            .search(
                &self.base_dn,
                Scope::Subtree,
                &format!("(uid={uid})"),
                vec!["givenName"],
            )
            .await?
            .success()?;
        let display_name =
            display_name_from(entries.into_iter().map(SearchEntry::construct).collect());

        // Groups holding the principal's fully-qualified DN under People.
        let filter = self.member_filter(&uid);
        let (entries, _res) = ldap
            .search(&self.base_dn, Scope::Subtree, &filter, Vec::<&str>::new())
            .await?
            .success()?;
        let groups = group_names_from(entries.into_iter().map(SearchEntry::construct).collect());

        Ok(DirectoryAttrs { display_name, groups })
    }

    fn member_filter(&self, uid: &str) -> String {
        format!("(member=uid={uid},ou=People,{})", self.base_dn)
    }
}

/// Given name from the uid search. Zero entries is not an error (empty
/// name); on multiple matches the first entry wins.
fn display_name_from(entries: Vec<SearchEntry>) -> String {
    entries
        .into_iter()
        .next()
        .and_then(|e| e.attrs.get("givenName").and_then(|v| v.first().cloned()))
        .unwrap_or_default()
}

/// Group common names in directory response order, duplicates kept; entries
/// without a cn are skipped.
fn group_names_from(entries: Vec<SearchEntry>) -> Vec<String> {
    let mut groups = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(cn) = entry.attrs.get("cn").and_then(|v| v.first()) {
            groups.push(cn.clone());
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn entry(attrs: &[(&str, &[&str])]) -> SearchEntry {
        SearchEntry {
            dn: "cn=test,dc=inf,dc=ed,dc=ac,dc=uk".to_string(),
            attrs: attrs
                .iter()
                .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
                .collect(),
            bin_attrs: HashMap::new(),
        }
    }

    fn resolver() -> DirectoryResolver {
        let cfg = Config::from_lookup(|key| match key {
            "PROVOST_COSIGN_NAME" => Some("svc".to_string()),
            "PROVOST_COSIGN_PASSWORD" => Some("secret".to_string()),
            _ => None,
        })
        .unwrap();
        DirectoryResolver::new(&cfg)
    }

    #[test]
    fn member_filter_uses_people_subtree_dn() {
        let r = resolver();
        let filter = r.member_filter(&ldap_escape("s1234567"));
        assert_eq!(
            filter,
            "(member=uid=s1234567,ou=People,dc=inf,dc=ed,dc=ac,dc=uk)"
        );
    }

    #[test]
    fn zero_name_matches_yield_empty_display_name() {
        assert_eq!(display_name_from(Vec::new()), "");
    }

    #[test]
    fn entry_without_given_name_yields_empty_display_name() {
        assert_eq!(display_name_from(vec![entry(&[("uid", &["s1234567"])])]), "");
    }

    #[test]
    fn first_entry_wins_on_multiple_name_matches() {
        let entries = vec![
            entry(&[("givenName", &["Ada"])]),
            entry(&[("givenName", &["Charles"])]),
        ];
        assert_eq!(display_name_from(entries), "Ada");
    }

    #[test]
    fn group_names_keep_response_order_and_skip_cn_less_entries() {
        let entries = vec![
            entry(&[("cn", &["role/student"])]),
            entry(&[("uid", &["not-a-group"])]),
            entry(&[("cn", &["role/module-cs101"])]),
            entry(&[("cn", &["role/module-cs101"])]),
        ];
        assert_eq!(
            group_names_from(entries),
            vec!["role/student", "role/module-cs101", "role/module-cs101"]
        );
    }

    #[test]
    fn principal_is_escaped_in_filters() {
        // A hostile principal cannot break out of the filter expression
        let escaped = ldap_escape("a)(uid=*");
        assert!(!escaped.contains('('));
        assert!(!escaped.contains(')'));
        assert!(!escaped.contains('*'));
    }
}
