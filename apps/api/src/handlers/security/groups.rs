use super::*;

pub async fn list_groups_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
) -> ApiResult<Json<Vec<GroupResponse>>> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityGroupManage)
        .await?;

    let groups = state
        .security_admin_service
        .list_groups(&context)
        .await?
        .into_iter()
        .map(GroupResponse::from)
        .collect();

    Ok(Json(groups))
}

pub async fn create_group_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
    Json(payload): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<GroupResponse>)> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityGroupManage)
        .await?;

    let permissions = payload
        .permissions
        .iter()
        .map(|value| Permission::from_str(value))
        .collect::<Result<BTreeSet<_>, _>>()?;

    let group = state
        .security_admin_service
        .create_group(&context, &payload.name, permissions)
        .await?;

    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

pub async fn delete_group_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityGroupManage)
        .await?;

    state
        .security_admin_service
        .delete_group(&context, GroupId::from_uuid(id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_group_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
    Json(payload): Json<GroupMembershipRequest>,
) -> ApiResult<StatusCode> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityGroupManage)
        .await?;

    state
        .security_admin_service
        .assign_group(
            &context,
            GroupId::from_uuid(payload.group_id),
            EmployeeId::from_uuid(payload.employee_id),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unassign_group_handler(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Extension(claims): Extension<TokenClaims>,
    Json(payload): Json<GroupMembershipRequest>,
) -> ApiResult<StatusCode> {
    state
        .access_guard
        .require_permission(&context, &claims, Permission::SecurityGroupManage)
        .await?;

    state
        .security_admin_service
        .unassign_group(
            &context,
            GroupId::from_uuid(payload.group_id),
            EmployeeId::from_uuid(payload.employee_id),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
