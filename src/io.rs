//! Tab-separated vocabulary, relation, and triple file readers.
//! Mirrors `ReaderLines`: buffered line-at-a-time reads with one
//! trailing `\r` stripped per line.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::{KbError, KbResult};
use crate::graph::Graph;

fn lines_of(path: &Path) -> KbResult<impl Iterator<Item = KbResult<String>>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(reader.lines().map(|l| {
        let mut s = l?;
        if s.ends_with('\r') {
            s.pop();
        }
        Ok(s)
    }))
}

/// Reads `name<TAB>count` lines, returning the name→index map and the
/// parallel `count` vector (used to drive `^alpha` sampling weights).
pub fn load_vocab(path: &Path) -> KbResult<(HashMap<String, u32>, Vec<f64>)> {
    let mut names = HashMap::new();
    let mut counts = Vec::new();
    for line in lines_of(path)? {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, '\t');
        let name = parts.next().ok_or_else(|| malformed(path, &line))?;
        let count: f64 = parts
            .next()
            .ok_or_else(|| malformed(path, &line))?
            .parse()
            .map_err(|_| malformed(path, &line))?;
        names.insert(name.to_string(), counts.len() as u32);
        counts.push(count);
    }
    Ok((names, counts))
}

/// Reads `name<TAB>count` lines, keeping only the name→index map.
pub fn load_relations(path: &Path) -> KbResult<HashMap<String, u32>> {
    let (names, _) = load_vocab(path)?;
    Ok(names)
}

/// Reads `head<TAB>relation<TAB>tail` lines into `graph`, injecting the
/// inverse relation for each triple. Aborts on an unrecognized name.
pub fn load_triples(
    path: &Path,
    entities: &HashMap<String, u32>,
    relations: &HashMap<String, u32>,
    num_relations: u32,
    graph: &mut Graph,
) -> KbResult<()> {
    for line in lines_of(path)? {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, '\t');
        let head = parts.next().ok_or_else(|| malformed(path, &line))?;
        let relation = parts.next().ok_or_else(|| malformed(path, &line))?;
        let tail = parts.next().ok_or_else(|| malformed(path, &line))?;

        let h = *entities.get(head).ok_or_else(|| KbError::UnknownName(head.to_string()))?;
        let r = *relations.get(relation).ok_or_else(|| KbError::UnknownName(relation.to_string()))?;
        let t = *entities.get(tail).ok_or_else(|| KbError::UnknownName(tail.to_string()))?;
        graph.insert_triple(h, r, t, num_relations);
    }
    Ok(())
}

fn malformed(path: &Path, line: &str) -> KbError {
    KbError::MalformedLine {
        path: path.display().to_string(),
        line: line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn vocab_parses_name_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.tsv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "alice\t10").unwrap();
        writeln!(f, "bob\t5\r").unwrap();
        let (names, counts) = load_vocab(&path).unwrap();
        assert_eq!(names["alice"], 0);
        assert_eq!(names["bob"], 1);
        assert_eq!(counts, vec![10.0, 5.0]);
    }

    #[test]
    fn triples_inject_inverse_edges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triples.tsv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "alice\tknows\tbob").unwrap();
        let entities: HashMap<String, u32> = [("alice".to_string(), 0), ("bob".to_string(), 1)].into_iter().collect();
        let relations: HashMap<String, u32> = [("knows".to_string(), 0)].into_iter().collect();
        let mut graph = Graph::with_capacity(2);
        load_triples(&path, &entities, &relations, 1, &mut graph).unwrap();
        assert_eq!(graph.neighbors(0), &[(0, 1)]);
        assert_eq!(graph.neighbors(1), &[(1, 0)]);
    }

    #[test]
    fn unknown_name_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triples.tsv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "alice\tknows\tcarol").unwrap();
        let entities: HashMap<String, u32> = [("alice".to_string(), 0)].into_iter().collect();
        let relations: HashMap<String, u32> = [("knows".to_string(), 0)].into_iter().collect();
        let mut graph = Graph::with_capacity(1);
        let err = load_triples(&path, &entities, &relations, 1, &mut graph);
        assert!(matches!(err, Err(KbError::UnknownName(_))));
    }
}
