//! The Dependency Resolver (§4.7): produces a topologically sorted install
//! order from the declared dependency DAG, and rejects cycles.
//!
//! Design note 9 calls out the source's manual pointer graph (a linked
//! list of nodes, each owning an array of dependency-name strings) as
//! something to replace with an arena: a vector of nodes plus a
//! name-to-index map, with edges as index pairs. That is exactly what
//! `DependencyGraph` below is (see DESIGN.md for why this stays a plain
//! `Vec`/`HashMap` arena rather than taking on the teacher's unused
//! `petgraph` dependency).

use std::collections::{HashMap, VecDeque};

use db::Database;
use package::manifest::Loader;
use util::errors::{ErrorKind, Res};

/// §3 `DependencyGraph`: an arena of nodes (by name) plus adjacency built
/// from each node's declared `dependencies`. `build_dependencies` are
/// deliberately excluded — per design note 9's Open Question, this
/// specification treats them as host prerequisites verified by the
/// builder, not as resolver inputs.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Index-stable node names, in discovery order (first-seen wins),
    /// which is also what makes tie-breaking deterministic.
    names: Vec<String>,
    index_of: HashMap<String, usize>,
    /// `dependencies[i]` = the dependency-node indices package `i` directly depends on.
    dependencies: Vec<Vec<usize>>,
}

impl DependencyGraph {
    fn node_index(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index_of.get(name) {
            return i;
        }
        let i = self.names.len();
        self.names.push(name.to_owned());
        self.index_of.insert(name.to_owned(), i);
        self.dependencies.push(Vec::new());
        i
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// Recursively loads `root` and every transitive `dependencies` entry
/// (not `build_dependencies`), building the arena graph described above.
fn build_graph(root: &str, loader: &Loader) -> Res<DependencyGraph> {
    let mut graph = DependencyGraph::default();
    let mut stack = vec![root.to_owned()];
    let mut seen = HashMap::new();

    while let Some(name) = stack.pop() {
        if seen.contains_key(&name) {
            continue;
        }
        let idx = graph.node_index(&name);
        let def = loader.load(&name)?;
        let mut dep_indices = Vec::with_capacity(def.dependencies.len());
        for dep in &def.dependencies {
            let dep_idx = graph.node_index(dep);
            dep_indices.push(dep_idx);
            if !seen.contains_key(dep) {
                stack.push(dep.clone());
            }
        }
        graph.dependencies[idx] = dep_indices;
        seen.insert(name, idx);
    }

    Ok(graph)
}

/// §4.7 `resolve(name) -> (ordered list of names) | CycleError`.
///
/// Kahn's algorithm: a node's in-degree is the number of *its own*
/// declared dependencies (edges pointing into it from the things it
/// depends on); nodes with zero in-degree have nothing left to wait on
/// and are emitted first, which is why leaves come out before the things
/// that depend on them.
pub fn resolve(root: &str, loader: &Loader) -> Res<Vec<String>> {
    let graph = build_graph(root, loader)?;
    let n = graph.len();

    let mut in_degree: Vec<usize> = graph.dependencies.iter().map(|d| d.len()).collect();
    // successors[i] = nodes that depend on i (reverse adjacency), used to
    // decrement in-degree as each node is emitted.
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (dependent, deps) in graph.dependencies.iter().enumerate() {
        for &dep in deps {
            successors[dep].push(dependent);
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &succ in &successors[node] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                queue.push_back(succ);
            }
        }
    }

    if order.len() != n {
        return Err(ErrorKind::Cycle(root.to_owned()).into());
    }

    let names: Vec<String> = order.into_iter().map(|i| graph.names[i].clone()).collect();
    debug_assert_eq!(names.last().map(String::as_str), Some(root));
    Ok(names)
}

/// §4.7 `find_dependents(name) -> list of names`: every installed package
/// whose declared `dependencies` include `name`, used before removal.
pub fn find_dependents(name: &str, db: &Database, loader: &Loader) -> Vec<String> {
    db.all()
        .iter()
        .filter_map(|entry| {
            let def = loader.load(&entry.name).ok()?;
            if def.dependencies.iter().any(|d| d == name) {
                Some(entry.name.clone())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use index::{Catalog, Repository};
    use std::fs;

    fn write_entry(dir: &::std::path::Path, name: &str, deps: &[&str]) {
        let deps_toml = deps
            .iter()
            .map(|d| format!("\"{}\"", d))
            .collect::<Vec<_>>()
            .join(", ");
        let body = format!(
            "name = \"{}\"\nversion = \"1.0.0\"\nsource_url = \"https://example.com/{}.tar.gz\"\ndependencies = [{}]\n",
            name, name, deps_toml
        );
        fs::write(dir.join(format!("{}.toml", name)), body).unwrap();
    }

    fn test_loader(dir: &::std::path::Path) -> (Catalog, ::slog::Logger) {
        let log = ::slog::Logger::root(::slog::Discard, o!());
        let repo = Repository {
            name: "test".into(),
            url: "".into(),
            branch: "master".into(),
            local_path: Some(dir.display().to_string()),
            priority: 0,
            enabled: true,
            last_sync: 0,
            last_commit: None,
        };
        (Catalog::new(dir.to_path_buf(), vec![repo], log.clone()), log)
    }

    #[test]
    fn linear_chain_resolves_dependencies_first() {
        let dir = ::tempfile::tempdir().unwrap();
        write_entry(dir.path(), "a", &["b"]);
        write_entry(dir.path(), "b", &["c"]);
        write_entry(dir.path(), "c", &[]);

        let (catalog, log) = test_loader(dir.path());
        let loader = Loader::new(&catalog, log);

        let order = resolve("a", &loader).unwrap();
        assert_eq!(order, vec!["c".to_string(), "b".to_string(), "a".to_string()]);
    }

    #[test]
    fn cycle_is_rejected() {
        let dir = ::tempfile::tempdir().unwrap();
        write_entry(dir.path(), "x", &["y"]);
        write_entry(dir.path(), "y", &["x"]);

        let (catalog, log) = test_loader(dir.path());
        let loader = Loader::new(&catalog, log);

        let err = resolve("x", &loader).unwrap_err();
        match err.kind() {
            ErrorKind::Cycle(_) => {}
            other => panic!("expected Cycle, got {:?}", other),
        }
    }

    #[test]
    fn each_name_appears_at_most_once() {
        let dir = ::tempfile::tempdir().unwrap();
        // diamond: a -> [b, c], b -> [d], c -> [d], d -> []
        write_entry(dir.path(), "a", &["b", "c"]);
        write_entry(dir.path(), "b", &["d"]);
        write_entry(dir.path(), "c", &["d"]);
        write_entry(dir.path(), "d", &[]);

        let (catalog, log) = test_loader(dir.path());
        let loader = Loader::new(&catalog, log);

        let order = resolve("a", &loader).unwrap();
        let mut seen = ::std::collections::HashSet::new();
        for name in &order {
            assert!(seen.insert(name.clone()), "duplicate entry: {}", name);
        }
        assert_eq!(order.last().unwrap(), "a");
        // d must precede both b and c
        let d_pos = order.iter().position(|n| n == "d").unwrap();
        let b_pos = order.iter().position(|n| n == "b").unwrap();
        let c_pos = order.iter().position(|n| n == "c").unwrap();
        assert!(d_pos < b_pos);
        assert!(d_pos < c_pos);
    }
}
