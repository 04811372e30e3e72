/// Resolves passage identifiers to their full text.
pub trait PassageLookup: Send + Sync {
    fn passage(&self, id: &str) -> Option<&str>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
