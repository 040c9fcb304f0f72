/*!
 * Directory tree rendering derived purely from scan paths
 */

/// A directory or file in the rendered hierarchy
#[derive(Debug)]
struct TreeNode {
    name: String,
    is_dir: bool,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_dir: true,
            children: Vec::new(),
        }
    }

    fn insert(&mut self, components: &[&str]) {
        let Some((first, rest)) = components.split_first() else {
            return;
        };
        let is_dir = !rest.is_empty();
        let index = match self
            .children
            .iter()
            .position(|c| c.name == *first && c.is_dir == is_dir)
        {
            Some(index) => index,
            None => {
                self.children.push(TreeNode {
                    name: first.to_string(),
                    is_dir,
                    children: Vec::new(),
                });
                self.children.len() - 1
            }
        };
        self.children[index].insert(rest);
    }

    fn render(&self, prefix: &str, lines: &mut Vec<String>) {
        let count = self.children.len();
        for (i, child) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            let connector = if last { "└── " } else { "├── " };
            let suffix = if child.is_dir { "/" } else { "" };
            lines.push(format!("{}{}{}{}", prefix, connector, child.name, suffix));

            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            child.render(&child_prefix, lines);
        }
    }
}

/// Render `paths` (already in scan order) as indented tree lines.
///
/// The first line is the root name; children keep the order in which they
/// first appear in `paths`.
pub fn render_tree<'a, I>(root_name: &str, paths: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut root = TreeNode::dir(root_name);
    for path in paths {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        root.insert(&components);
    }

    let mut lines = vec![format!("{}/", root.name)];
    root.render("", &mut lines);
    lines
}
