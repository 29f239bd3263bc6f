//! In-memory portal double for end-to-end orchestrator tests.
//!
//! Resolves every locator by default; specific locators can be made
//! unreachable per test. Clicking any CSV export link writes the next
//! queued download into the currently routed download directory, which
//! is how the browser's async download pipeline is simulated.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use icici_extract::portal::{ElementHandle, Locator, Portal, Wait};

#[derive(Debug, Clone)]
pub struct RowSpec {
    pub class: String,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TableSpec {
    pub headers: Vec<String>,
    pub rows: Vec<RowSpec>,
}

#[derive(Debug, Clone)]
enum FakeElement {
    Node(String),
    Dropdown,
    Table,
    HeaderCell(usize),
    Row(usize),
    Cell(usize, usize),
}

#[derive(Default)]
struct State {
    next_id: u64,
    elements: HashMap<u64, FakeElement>,
    /// Locator display substrings that never resolve.
    missing: Vec<String>,
    dropdown_options: Vec<String>,
    selected_account: Option<String>,
    table: Option<TableSpec>,
    download_dir: Option<PathBuf>,
    pending_downloads: VecDeque<(String, String)>,
    frame_depth: usize,
    typed: Vec<(String, String)>,
    visited: Vec<String>,
}

pub struct FakePortal {
    state: Mutex<State>,
}

impl FakePortal {
    pub fn new(dropdown_options: Vec<&str>) -> Self {
        let mut state = State::default();
        state.dropdown_options = dropdown_options.into_iter().map(String::from).collect();
        Self { state: Mutex::new(state) }
    }

    pub fn with_table(self, table: TableSpec) -> Self {
        self.state.lock().unwrap().table = Some(table);
        self
    }

    /// Make every locator whose display form contains `fragment`
    /// unresolvable.
    pub fn hide(&self, fragment: &str) {
        self.state.lock().unwrap().missing.push(fragment.to_string());
    }

    /// Queue a file to be written on the next CSV export click.
    pub fn queue_download(&self, name: &str, contents: &str) {
        self.state
            .lock()
            .unwrap()
            .pending_downloads
            .push_back((name.to_string(), contents.to_string()));
    }

    pub fn selected_account(&self) -> Option<String> {
        self.state.lock().unwrap().selected_account.clone()
    }

    pub fn typed_into(&self, locator_fragment: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .typed
            .iter()
            .find(|(key, _)| key.contains(locator_fragment))
            .map(|(_, text)| text.clone())
    }

    fn register(state: &mut State, element: FakeElement) -> ElementHandle {
        state.next_id += 1;
        let id = state.next_id;
        state.elements.insert(id, element);
        ElementHandle::new(id)
    }

    fn lookup(state: &State, element: &ElementHandle) -> Result<FakeElement> {
        state
            .elements
            .get(&element.raw())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown element handle {}", element.raw()))
    }

    fn handle_click(&self, element: &ElementHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let found = Self::lookup(&state, element)?;
        if let FakeElement::Node(key) = &found {
            if key.contains("CSV") {
                let (name, contents) = match state.pending_downloads.pop_front() {
                    Some(download) => download,
                    None => bail!("CSV export clicked with no queued download"),
                };
                let dir = match &state.download_dir {
                    Some(dir) => dir.clone(),
                    None => bail!("CSV export clicked before download routing was set"),
                };
                std::fs::create_dir_all(&dir)?;
                std::fs::write(dir.join(name), contents)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Portal for FakePortal {
    async fn goto(&self, url: &str) -> Result<()> {
        self.state.lock().unwrap().visited.push(url.to_string());
        Ok(())
    }

    async fn try_find(&self, locator: &Locator, _wait: Wait) -> Result<Option<ElementHandle>> {
        let key = locator.to_string();
        let mut state = self.state.lock().unwrap();
        if state.missing.iter().any(|fragment| key.contains(fragment)) {
            return Ok(None);
        }
        let element = if key.contains("drpAccount") {
            FakeElement::Dropdown
        } else if key.contains("table[2]") {
            if state.table.is_none() {
                return Ok(None);
            }
            FakeElement::Table
        } else {
            FakeElement::Node(key)
        };
        Ok(Some(Self::register(&mut state, element)))
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.handle_click(element)
    }

    async fn click_unchecked(&self, element: &ElementHandle) -> Result<()> {
        self.handle_click(element)
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let found = Self::lookup(&state, element)?;
        if let FakeElement::Node(key) = found {
            state.typed.push((key, text.to_string()));
        }
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> Result<String> {
        let state = self.state.lock().unwrap();
        let found = Self::lookup(&state, element)?;
        let table = state.table.as_ref();
        Ok(match found {
            FakeElement::HeaderCell(i) => table
                .and_then(|t| t.headers.get(i))
                .cloned()
                .unwrap_or_default(),
            FakeElement::Cell(row, col) => table
                .and_then(|t| t.rows.get(row))
                .and_then(|r| r.cells.get(col))
                .cloned()
                .unwrap_or_default(),
            _ => String::new(),
        })
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        let found = Self::lookup(&state, element)?;
        if name != "class" {
            return Ok(None);
        }
        Ok(match found {
            FakeElement::Row(i) => state.table.as_ref().and_then(|t| t.rows.get(i)).map(|r| r.class.clone()),
            _ => None,
        })
    }

    async fn find_all(
        &self,
        scope: Option<&ElementHandle>,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>> {
        let key = locator.to_string();
        let mut state = self.state.lock().unwrap();
        let scoped = match scope {
            Some(handle) => Some(Self::lookup(&state, handle)?),
            None => None,
        };

        let table = match state.table.clone() {
            Some(table) => table,
            None => return Ok(Vec::new()),
        };

        let elements: Vec<FakeElement> = match scoped {
            Some(FakeElement::Table) if key.contains("thead") => {
                (0..table.headers.len()).map(FakeElement::HeaderCell).collect()
            }
            Some(FakeElement::Table) if key.contains("tbody") => {
                (0..table.rows.len()).map(FakeElement::Row).collect()
            }
            Some(FakeElement::Row(i)) if key.contains("td") => {
                let cells = table.rows.get(i).map(|r| r.cells.len()).unwrap_or(0);
                (0..cells).map(|c| FakeElement::Cell(i, c)).collect()
            }
            _ => Vec::new(),
        };

        Ok(elements
            .into_iter()
            .map(|element| Self::register(&mut state, element))
            .collect())
    }

    async fn select_options(&self, element: &ElementHandle) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        match Self::lookup(&state, element)? {
            FakeElement::Dropdown => Ok(state.dropdown_options.clone()),
            _ => bail!("select_options on a non-select element"),
        }
    }

    async fn select_value(&self, element: &ElementHandle, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match Self::lookup(&state, element)? {
            FakeElement::Dropdown => {
                if !state.dropdown_options.iter().any(|o| o == value) {
                    bail!("option {value} not present");
                }
                state.selected_account = Some(value.to_string());
                Ok(())
            }
            _ => bail!("select_value on a non-select element"),
        }
    }

    async fn eval_bool(&self, _expression: &str) -> Result<bool> {
        Ok(true)
    }

    async fn enter_frame(&self, _locator: &Locator) -> Result<()> {
        self.state.lock().unwrap().frame_depth += 1;
        Ok(())
    }

    async fn exit_frame(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.frame_depth == 0 {
            bail!("exit_frame with no entered frame");
        }
        state.frame_depth -= 1;
        Ok(())
    }

    async fn set_download_dir(&self, dir: &Path) -> Result<()> {
        self.state.lock().unwrap().download_dir = Some(dir.to_path_buf());
        Ok(())
    }

    async fn page_title(&self) -> Result<String> {
        Ok("ICICI Direct".to_string())
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(state.visited.last().cloned().unwrap_or_default())
    }
}
