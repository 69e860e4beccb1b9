/// Placeholder expanded to the host's folder structure.
pub const FOLDER_TREE_VAR: &str = "{{folder_tree}}";

/// Host-side formatter providing the vault folder structure as text.
pub trait FolderTreeSource: Send + Sync {
    fn folder_tree(&self) -> String;
}

/// Substitute `{{folder_tree}}` in `template` with the source's structure
/// text. Without a wired source the template passes through unchanged.
pub fn expand_folder_tree_var(template: &str, source: Option<&dyn FolderTreeSource>) -> String {
    if !template.contains(FOLDER_TREE_VAR) {
        return template.to_string();
    }
    match source {
        Some(source) => template.replace(FOLDER_TREE_VAR, &source.folder_tree()),
        None => {
            tracing::debug!("no folder-tree source wired; leaving placeholder in place");
            template.to_string()
        }
    }
}
