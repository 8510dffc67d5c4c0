//! Whereabouts entry point
//!
//! Handles platform-specific initialization and wires the browser UI.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::{Document, Element, HtmlInputElement, HtmlSelectElement};

    use whereabouts::api::{Character, CharacterClient, CharacterDetail};
    use whereabouts::viewmodel::{
        CharactersListModel, LocationBrowserModel, SEARCH_DEBOUNCE_MS, feedback,
    };
    use whereabouts::{
        AssignOptions, AssignmentStore, CharacterSummary, KeyValueStore, LocalStorage,
        MemoryStore, PersistenceBinding,
    };

    /// App instance holding all state
    struct App {
        store: AssignmentStore,
        binding: PersistenceBinding<Box<dyn KeyValueStore>>,
        client: CharacterClient,
        list: CharactersListModel,
        browser: LocationBrowserModel,
        characters: Vec<Character>,
        detail: Option<CharacterDetail>,
        loading: bool,
        // Generation counters to drop stale debounce timers and responses
        search_generation: u32,
        fetch_generation: u32,
    }

    impl App {
        /// Persist the current snapshot; called once after every
        /// successful mutation. A rejected write is reported and the
        /// in-memory store stays authoritative for the session.
        fn commit(&mut self) {
            if let Err(err) = self.binding.save(self.store.state()) {
                log::warn!("Failed to persist assignments: {err}");
            }
        }

        /// Reconcile the by-location selection with the current locations.
        fn sync_browser_selection(&mut self) {
            let App { store, browser, .. } = self;
            browser.sync(store.list_locations().map(|(name, _)| name));
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Whereabouts starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        let device: Box<dyn KeyValueStore> = match LocalStorage::new() {
            Some(storage) => Box::new(storage),
            None => {
                log::warn!("LocalStorage unavailable, assignments will not outlive this session");
                Box::new(MemoryStore::new())
            }
        };
        let binding = PersistenceBinding::new(device);
        let store = AssignmentStore::from_state(binding.load());

        let mut browser = LocationBrowserModel::new();
        browser.sync(store.list_locations().map(|(name, _)| name));

        let app = Rc::new(RefCell::new(App {
            store,
            binding,
            client: CharacterClient::new(),
            list: CharactersListModel::new(),
            browser,
            characters: Vec::new(),
            detail: None,
            loading: false,
            search_generation: 0,
            fetch_generation: 0,
        }));

        setup_search_input(&document, app.clone());
        setup_pagination(&document, app.clone());
        setup_characters_panel(&document, app.clone());
        setup_assignment_panel(&document, app.clone());
        setup_locations_panel(&document, app.clone());

        render(&app);
        refresh_characters(app);

        log::info!("Whereabouts running!");
    }

    /// Fetch the current page with the current filter and re-render.
    fn refresh_characters(app: Rc<RefCell<App>>) {
        let (page, filter, generation, client) = {
            let mut a = app.borrow_mut();
            a.loading = true;
            a.fetch_generation += 1;
            (
                a.list.page(),
                a.list.name_filter().map(str::to_string),
                a.fetch_generation,
                a.client.clone(),
            )
        };
        render(&app);

        spawn_local(async move {
            let result = client.fetch_characters(page, filter.as_deref()).await;

            {
                let mut a = app.borrow_mut();
                if a.fetch_generation != generation {
                    // A newer search or page change superseded this fetch
                    return;
                }
                a.loading = false;
                match result {
                    Ok(fetched) => {
                        a.list.apply_page_info(&fetched.info);
                        a.characters = fetched.results;
                    }
                    Err(err) => {
                        log::warn!("Character query failed: {err}");
                        a.characters.clear();
                    }
                }
            }
            render(&app);
        });
    }

    fn setup_search_input(document: &Document, app: Rc<RefCell<App>>) {
        let Some(input) = document.get_element_by_id("search-input") else {
            return;
        };

        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::Event| {
            let Some(value) = event
                .target()
                .and_then(|t| t.dyn_into::<HtmlInputElement>().ok())
                .map(|input| input.value())
            else {
                return;
            };

            let generation = {
                let mut a = app.borrow_mut();
                a.search_generation += 1;
                a.search_generation
            };

            // Debounce: only the latest keystroke's timer survives
            let app = app.clone();
            let settle = Closure::once_into_js(move || {
                {
                    let mut a = app.borrow_mut();
                    if a.search_generation != generation {
                        return;
                    }
                    a.list.set_search(value);
                }
                refresh_characters(app);
            });
            let window = web_sys::window().unwrap();
            let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(
                settle.unchecked_ref(),
                SEARCH_DEBOUNCE_MS,
            );
        });
        let _ = input.add_event_listener_with_callback("input", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_pagination(document: &Document, app: Rc<RefCell<App>>) {
        if let Some(btn) = document.get_element_by_id("prev-btn") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                if app.borrow_mut().list.go_to_previous_page() {
                    refresh_characters(app.clone());
                }
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        if let Some(btn) = document.get_element_by_id("next-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                if app.borrow_mut().list.go_to_next_page() {
                    refresh_characters(app.clone());
                }
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_characters_panel(document: &Document, app: Rc<RefCell<App>>) {
        let Some(container) = document.get_element_by_id("characters") else {
            return;
        };

        // Clicking anywhere on a card opens that character's detail
        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::MouseEvent| {
            let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
                return;
            };
            let Some(card) = target.closest("[data-detail]").ok().flatten() else {
                return;
            };
            let Some(id) = card.get_attribute("data-detail") else {
                return;
            };
            load_detail(app.clone(), id);
        });
        let _ =
            container.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    /// Fetch full detail for one character and show it.
    fn load_detail(app: Rc<RefCell<App>>, id: String) {
        let client = app.borrow().client.clone();
        spawn_local(async move {
            match client.fetch_character_by_id(&id).await {
                Ok(Some(detail)) => {
                    app.borrow_mut().detail = Some(detail);
                    render(&app);
                }
                Ok(None) => log::warn!("Character {id} not found"),
                Err(err) => log::warn!("Character detail query failed: {err}"),
            }
        });
    }

    fn setup_assignment_panel(document: &Document, app: Rc<RefCell<App>>) {
        // Assign the selected character to an existing location
        if let Some(btn) = document.get_element_by_id("assign-btn") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                let document = web_sys::window().unwrap().document().unwrap();
                let character = selected_character(&document, &app);
                let location = select_value(&document, "location-select");

                let message = match (character, location) {
                    (Some(character), Some(location)) => {
                        let mut a = app.borrow_mut();
                        match a.store.assign_character(
                            character,
                            &location,
                            AssignOptions::default(),
                        ) {
                            Ok(()) => {
                                a.commit();
                                a.browser.select(location.trim());
                                feedback::assigned(location.trim())
                            }
                            Err(err) => feedback::rejected(&err),
                        }
                    }
                    _ => feedback::no_location_selected(),
                };

                app.borrow_mut().sync_browser_selection();
                set_feedback(&document, &message);
                render(&app);
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Create a brand-new location for the selected character
        if let Some(btn) = document.get_element_by_id("create-btn") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                create_location(&app);
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Enter in the new-location field submits like the button
        if let Some(input) = document.get_element_by_id("new-location-input") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::KeyboardEvent| {
                if event.key() == "Enter" {
                    create_location(&app);
                }
            });
            let _ =
                input.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Release the selected character from its location
        if let Some(btn) = document.get_element_by_id("unassign-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                let document = web_sys::window().unwrap().document().unwrap();
                let Some(character) = selected_character(&document, &app) else {
                    return;
                };
                {
                    let mut a = app.borrow_mut();
                    // A character with no location is a no-op; nothing to persist
                    let had_location = a.store.location_of(&character.id).is_some();
                    a.store.unassign_character(&character.id);
                    if had_location {
                        a.commit();
                    }
                    a.sync_browser_selection();
                }
                set_feedback(&document, &feedback::unassigned());
                render(&app);
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn create_location(app: &Rc<RefCell<App>>) {
        let document = web_sys::window().unwrap().document().unwrap();
        let Some(character) = selected_character(&document, app) else {
            set_feedback(&document, &feedback::no_location_selected());
            return;
        };
        let raw_name = input_value(&document, "new-location-input").unwrap_or_default();

        let message = {
            let mut a = app.borrow_mut();
            match a.store.assign_character(
                character,
                &raw_name,
                AssignOptions {
                    require_new_location: true,
                },
            ) {
                Ok(()) => {
                    a.commit();
                    let trimmed = raw_name.trim();
                    a.browser.select(trimmed);
                    if let Some(input) = document
                        .get_element_by_id("new-location-input")
                        .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
                    {
                        input.set_value("");
                    }
                    feedback::created(trimmed)
                }
                Err(err) => feedback::rejected(&err),
            }
        };

        set_feedback(&document, &message);
        render(app);
    }

    fn setup_locations_panel(document: &Document, app: Rc<RefCell<App>>) {
        let Some(container) = document.get_element_by_id("locations") else {
            return;
        };

        // Delegated clicks: location headers expand, resident buttons unassign
        let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::MouseEvent| {
            let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
                return;
            };

            if let Some(id) = target.get_attribute("data-unassign") {
                {
                    let mut a = app.borrow_mut();
                    let had_location = a.store.location_of(&id).is_some();
                    a.store.unassign_character(&id);
                    if had_location {
                        a.commit();
                    }
                    a.sync_browser_selection();
                }
                let document = web_sys::window().unwrap().document().unwrap();
                set_feedback(&document, &feedback::unassigned());
                render(&app);
            } else if let Some(name) = target.get_attribute("data-location") {
                app.borrow_mut().browser.select(name);
                render(&app);
            }
        });
        let _ =
            container.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    /// The character currently picked in the assignment panel.
    fn selected_character(document: &Document, app: &Rc<RefCell<App>>) -> Option<CharacterSummary> {
        let id = select_value(document, "character-select")?;
        let a = app.borrow();
        a.characters
            .iter()
            .find(|character| character.id == id)
            .map(CharacterSummary::from)
    }

    fn select_value(document: &Document, id: &str) -> Option<String> {
        document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
            .map(|select| select.value())
            .filter(|value| !value.is_empty())
    }

    fn input_value(document: &Document, id: &str) -> Option<String> {
        document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
            .map(|input| input.value())
    }

    fn set_feedback(document: &Document, message: &str) {
        if let Some(el) = document.get_element_by_id("feedback") {
            el.set_text_content(Some(message));
        }
    }

    /// Redraw every dynamic region from the current app state.
    fn render(app: &Rc<RefCell<App>>) {
        let document = web_sys::window().unwrap().document().unwrap();
        let a = app.borrow();

        render_characters(&document, &a);
        render_pagination(&document, &a);
        render_selects(&document, &a);
        render_detail(&document, &a);
        render_locations(&document, &a);

        if let Some(el) = document.get_element_by_id("loading") {
            let class = if a.loading { "" } else { "hidden" };
            let _ = el.set_attribute("class", class);
        }
    }

    fn render_characters(document: &Document, app: &App) {
        let Some(container) = document.get_element_by_id("characters") else {
            return;
        };

        if !app.loading && app.characters.is_empty() {
            container
                .set_inner_html(r#"<p class="empty-state">No characters match this search.</p>"#);
            return;
        }

        let mut html = String::new();
        for character in &app.characters {
            let assigned = app
                .store
                .location_of(&character.id)
                .map(|location| {
                    format!(
                        r#"<span class="card__assigned">{}</span>"#,
                        escape_html(location)
                    )
                })
                .unwrap_or_default();

            html.push_str(&format!(
                r#"<article class="card" data-detail="{id}">
  <img src="{image}" alt="{name}" loading="lazy" />
  <div class="card__body">
    <h3>{name}</h3>
    <p>{status} &middot; {species}</p>
    {assigned}
  </div>
</article>"#,
                id = escape_html(&character.id),
                image = escape_html(&character.image),
                name = escape_html(&character.name),
                status = escape_html(&character.status),
                species = escape_html(&character.species),
                assigned = assigned,
            ));
        }
        container.set_inner_html(&html);
    }

    fn render_pagination(document: &Document, app: &App) {
        if let Some(el) = document.get_element_by_id("page-label") {
            let label = if app.list.total_pages() > 0 {
                format!("Page {} of {}", app.list.page(), app.list.total_pages())
            } else {
                String::new()
            };
            el.set_text_content(Some(&label));
        }

        set_button_enabled(document, "prev-btn", app.list.has_prev());
        set_button_enabled(document, "next-btn", app.list.has_next());
    }

    fn set_button_enabled(document: &Document, id: &str, enabled: bool) {
        if let Some(el) = document.get_element_by_id(id) {
            if enabled {
                let _ = el.remove_attribute("disabled");
            } else {
                let _ = el.set_attribute("disabled", "disabled");
            }
        }
    }

    fn render_selects(document: &Document, app: &App) {
        if let Some(select) = document
            .get_element_by_id("character-select")
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
        {
            let previous = select.value();
            let mut html = String::new();
            for character in &app.characters {
                html.push_str(&format!(
                    r#"<option value="{}">{}</option>"#,
                    escape_html(&character.id),
                    escape_html(&character.name),
                ));
            }
            select.set_inner_html(&html);
            if app.characters.iter().any(|c| c.id == previous) {
                select.set_value(&previous);
            }
        }

        if let Some(select) = document
            .get_element_by_id("location-select")
            .and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
        {
            let previous = select.value();
            let mut html = String::new();
            for (name, _) in app.store.list_locations() {
                html.push_str(&format!(
                    r#"<option value="{0}">{0}</option>"#,
                    escape_html(name),
                ));
            }
            select.set_inner_html(&html);
            if app.store.list_locations().any(|(name, _)| name == previous) {
                select.set_value(&previous);
            }
        }
    }

    fn render_detail(document: &Document, app: &App) {
        let Some(container) = document.get_element_by_id("detail") else {
            return;
        };

        let Some(detail) = &app.detail else {
            container.set_inner_html(
                r#"<p class="empty-state">Pick a character card to see its details.</p>"#,
            );
            return;
        };

        let kind = detail
            .kind
            .as_deref()
            .filter(|kind| !kind.is_empty())
            .map(|kind| format!(r#"<span class="detail__chip">{}</span>"#, escape_html(kind)))
            .unwrap_or_default();

        let origin = match detail.origin.dimension.as_deref() {
            Some(dimension) => format!(
                "{} ({})",
                escape_html(&detail.origin.name),
                escape_html(dimension)
            ),
            None => escape_html(&detail.origin.name),
        };

        let assignment = app
            .store
            .location_of(&detail.id)
            .map(|location| {
                format!(
                    r#"<p class="detail__assignment">Assigned to {}</p>"#,
                    escape_html(location)
                )
            })
            .unwrap_or_default();

        let mut episodes = String::new();
        for episode in detail.highlighted_episodes() {
            episodes.push_str(&format!(
                "<li>{} &middot; {}</li>",
                escape_html(&episode.episode),
                escape_html(&episode.name),
            ));
        }

        container.set_inner_html(&format!(
            r#"<div class="detail-hero">
  <img src="{image}" alt="{name}" />
  <div>
    <h2>{name}</h2>
    <p>{status} &middot; {species} &middot; {gender}</p>
    {kind}
    <p>Origin: {origin}</p>
    <p>Last known: {last_known}</p>
    {assignment}
  </div>
</div>
<ul class="detail__episodes">{episodes}</ul>"#,
            image = escape_html(&detail.image),
            name = escape_html(&detail.name),
            status = escape_html(&detail.status),
            species = escape_html(&detail.species),
            gender = escape_html(&detail.gender),
            kind = kind,
            origin = origin,
            last_known = escape_html(&detail.location.name),
            assignment = assignment,
            episodes = episodes,
        ));
    }

    fn render_locations(document: &Document, app: &App) {
        let Some(container) = document.get_element_by_id("locations") else {
            return;
        };

        if app.store.list_locations().next().is_none() {
            container.set_inner_html(
                r#"<p class="empty-state">No custom locations yet. Assign a character to create one.</p>"#,
            );
            return;
        }

        let mut html = String::new();
        for (name, residents) in app.store.list_locations() {
            let expanded = app.browser.selected() == Some(name);
            let class = if expanded {
                "location location--active"
            } else {
                "location"
            };

            html.push_str(&format!(
                r#"<section class="{class}">
  <h3 data-location="{name}">{name} <span class="location__count">{count}</span></h3>"#,
                class = class,
                name = escape_html(name),
                count = residents.len(),
            ));

            if expanded {
                html.push_str("<ul>");
                for resident in residents {
                    html.push_str(&format!(
                        r#"<li>{name} <button data-unassign="{id}">Release</button></li>"#,
                        name = escape_html(&resident.name),
                        id = escape_html(&resident.id),
                    ));
                }
                html.push_str("</ul>");
            }
            html.push_str("</section>");
        }
        container.set_inner_html(&html);
    }

    fn escape_html(input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_app::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Whereabouts (native) starting...");
    log::info!("Native mode is headless - run with `trunk serve` for the web version");

    // Run smoke check
    println!("\nRunning assignment smoke check...");
    smoke_check_assignments();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn smoke_check_assignments() {
    use whereabouts::{
        AssignOptions, AssignmentStore, CharacterSummary, MemoryStore, PersistenceBinding,
    };

    let rick = CharacterSummary {
        id: "1".to_string(),
        name: "Rick Sanchez".to_string(),
        image: "https://rickandmortyapi.com/api/character/avatar/1.jpeg".to_string(),
        status: "Alive".to_string(),
        species: "Human".to_string(),
    };

    let mut store = AssignmentStore::new();
    store
        .assign_character(rick.clone(), "Citadel", AssignOptions::default())
        .expect("assign should succeed");
    store
        .assign_character(rick, "Earth", AssignOptions::default())
        .expect("move should succeed");
    assert_eq!(store.location_of("1"), Some("Earth"));
    assert_eq!(store.residents_of("Citadel").len(), 0);

    let mut binding = PersistenceBinding::new(MemoryStore::new());
    binding.save(store.state()).expect("save should succeed");
    assert_eq!(&binding.load(), store.state());

    println!("✓ Assignment smoke check passed!");
}
