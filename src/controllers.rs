//! 示例控制器：部门、员工与 JSON API。
//!
//! 注册顺序即查找优先级，`/dept/new` 必须先于 `/dept/{id}`。

use serde_derive::Serialize;

use webfront::{
    Bindable, HandlerFault, HttpRequestMethod, Invocation, ModelView, ObjectSchema, Outcome,
    ParamSpec, Registration, SchemaBuilder,
};

#[derive(Default, Debug, Clone, Serialize)]
pub struct Dept {
    id: i32,
    name: String,
}

impl Bindable for Dept {
    fn schema() -> ObjectSchema {
        SchemaBuilder::<Dept>::new()
            .int("id", |d, v| d.id = v)
            .string("name", |d, v| d.name = v)
            .build()
    }
}

#[derive(Default, Debug, Clone, Serialize)]
pub struct Person {
    name: String,
    age: i32,
}

impl Bindable for Person {
    fn schema() -> ObjectSchema {
        SchemaBuilder::<Person>::new()
            .string("name", |p, v| p.name = v)
            .int("age", |p, v| p.age = v)
            .build()
    }
}

#[derive(Default, Debug, Clone, Serialize)]
pub struct Emp {
    #[serde(flatten)]
    person: Person,
    salary: f64,
    dept: i32,
}

impl Bindable for Emp {
    fn schema() -> ObjectSchema {
        SchemaBuilder::<Emp>::new()
            .float("salary", |e, v| e.salary = v)
            .int("dept", |e, v| e.dept = v)
            .extends(|e: &mut Emp| &mut e.person)
            .build()
    }
}

fn sample_depts() -> Vec<Dept> {
    [(1, "Sales"), (2, "Research"), (3, "Operations")]
        .iter()
        .map(|(id, name)| Dept {
            id: *id,
            name: name.to_string(),
        })
        .collect()
}

#[derive(Default)]
pub struct DeptController;

impl DeptController {
    fn create_form(&mut self, _: &mut Invocation) -> Result<Outcome, HandlerFault> {
        Ok(ModelView::new("dept/form").with_attribute("dept", Dept::default()).into())
    }

    fn show(&mut self, inv: &mut Invocation) -> Result<Outcome, HandlerFault> {
        let id = inv.args().int(0).unwrap_or_default();
        Ok(Outcome::text(format!("Dept #{}", id)))
    }

    fn show_named(&mut self, inv: &mut Invocation) -> Result<Outcome, HandlerFault> {
        let id = inv.args().int(0).unwrap_or_default();
        let name = inv.args().str(1).unwrap_or_default().to_string();
        Ok(Outcome::text(format!("Dept #{} ({})", id, name)))
    }

    fn save(&mut self, inv: &mut Invocation) -> Result<Outcome, HandlerFault> {
        let dept = inv
            .args_mut()
            .take_object::<Dept>(0)
            .ok_or_else(|| HandlerFault::new("dept parameter was not bound"))?;
        if dept.name.trim().is_empty() {
            return Err(HandlerFault::new("Department name is required")
                .with_detail(format!("received dept id {}", dept.id)));
        }
        Ok(ModelView::new("dept/saved").with_attribute("dept", dept).into())
    }
}

#[derive(Default)]
pub struct EmpController;

impl EmpController {
    fn form(&mut self, _: &mut Invocation) -> Result<Outcome, HandlerFault> {
        Ok(ModelView::new("emp/form").into())
    }

    fn save_all(&mut self, inv: &mut Invocation) -> Result<Outcome, HandlerFault> {
        let emps: Vec<Emp> = inv
            .args_mut()
            .take_array::<Emp>(0)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect();
        let total: f64 = emps.iter().map(|e| e.salary).sum();
        let mut mv = ModelView::new("emp/saved");
        mv.add_attribute("emps", &emps).add_attribute("total", total);
        Ok(mv.into())
    }

    fn upload(&mut self, inv: &mut Invocation) -> Result<Outcome, HandlerFault> {
        let owner = inv.args().str(0).unwrap_or_default().to_string();
        match inv.args().file(1) {
            Some(file) => Ok(Outcome::text(format!(
                "{} uploaded {} ({} bytes, {})",
                owner,
                file.file_name,
                file.content.len(),
                file.content_type
            ))),
            None => {
                Err(HandlerFault::new("No file uploaded").with_detail("expected field 'photo'"))
            }
        }
    }
}

#[derive(Default)]
pub struct DeptApi;

impl DeptApi {
    fn list(&mut self, _: &mut Invocation) -> Result<Outcome, HandlerFault> {
        Ok(Outcome::data(&sample_depts()))
    }

    fn get(&mut self, inv: &mut Invocation) -> Result<Outcome, HandlerFault> {
        let id = inv.args().int(0).unwrap_or_default();
        match sample_depts().into_iter().find(|d| d.id == id) {
            Some(dept) => Ok(Outcome::data(&dept)),
            None => Ok(Outcome::Empty),
        }
    }
}

/// 宿主启动时交给路由表的注册列表。
pub fn registrations() -> Vec<Registration> {
    use HttpRequestMethod::{Get, Post};

    vec![
        Registration::controller::<DeptController, _>(Get, "/dept/new", "createForm", |c, inv| {
            c.create_form(inv)
        }),
        Registration::controller::<DeptController, _>(Get, "/dept/{id}", "show", |c, inv| {
            c.show(inv)
        })
        .param(ParamSpec::int("id")),
        Registration::controller::<DeptController, _>(
            Get,
            "/dept/{id}/{name}",
            "showNamed",
            |c, inv| c.show_named(inv),
        )
        .param(ParamSpec::int("id"))
        .param(ParamSpec::string("name")),
        Registration::controller::<DeptController, _>(Post, "/dept/save", "save", |c, inv| {
            c.save(inv)
        })
        .param(ParamSpec::object::<Dept>("dept")),
        Registration::controller::<EmpController, _>(Get, "/emp/form", "form", |c, inv| {
            c.form(inv)
        }),
        Registration::controller::<EmpController, _>(Post, "/emp/save", "saveAll", |c, inv| {
            c.save_all(inv)
        })
        .param(ParamSpec::array::<Emp>("emp")),
        Registration::controller::<EmpController, _>(Post, "/emp/upload", "upload", |c, inv| {
            c.upload(inv)
        })
        .param(ParamSpec::string("owner"))
        .param(ParamSpec::file("photo")),
        Registration::controller::<DeptApi, _>(Get, "/api/dept", "list", |c, inv| c.list(inv))
            .api(),
        Registration::controller::<DeptApi, _>(Get, "/api/dept/{id}", "get", |c, inv| {
            c.get(inv)
        })
        .param(ParamSpec::int("id"))
        .api(),
    ]
}
