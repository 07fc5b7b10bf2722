use serde::Serialize;

/// Dropdown of `update` buttons toggling trace visibility.
#[derive(Debug, Serialize)]
pub struct UpdateMenu {
    pub buttons: Vec<Button>,
    pub direction: &'static str,
    pub showactive: bool,
    pub x: f64,
    pub xanchor: &'static str,
    pub y: f64,
    pub yanchor: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Button {
    pub label: String,
    pub method: &'static str,
    /// Serialized as `[{"visible": [...]}, {"title": "..."}]`.
    pub args: (TraceUpdate, LayoutUpdate),
}

#[derive(Debug, Serialize)]
pub struct TraceUpdate {
    pub visible: Vec<bool>,
}

#[derive(Debug, Serialize)]
pub struct LayoutUpdate {
    pub title: String,
}

impl Button {
    fn update(label: String, visible: Vec<bool>, title: String) -> Self {
        Self {
            label,
            method: "update",
            args: (TraceUpdate { visible }, LayoutUpdate { title }),
        }
    }
}

impl UpdateMenu {
    /// "Show All", one "Hide {trace}" per trace, then "Show None" which keeps
    /// only the first (candlestick) trace. Masks follow `trace_names` order.
    pub fn visibility(trace_names: &[String]) -> Self {
        let count = trace_names.len();
        let mut buttons = Vec::with_capacity(count + 2);

        buttons.push(Button::update(
            "Show All".into(),
            vec![true; count],
            "All Indicators Displayed".into(),
        ));

        for (i, name) in trace_names.iter().enumerate() {
            let mut visible = vec![true; count];
            visible[i] = false;
            buttons.push(Button::update(
                format!("Hide {name}"),
                visible,
                format!("{name} Hidden"),
            ));
        }

        let only_first = (0..count).map(|i| i == 0).collect();
        buttons.push(Button::update(
            "Show None".into(),
            only_first,
            "Candlestick Only".into(),
        ));

        Self {
            buttons,
            direction: "down",
            showactive: true,
            x: 1.0,
            xanchor: "right",
            y: 1.15,
            yanchor: "top",
        }
    }
}
